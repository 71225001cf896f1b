//! Network Writer
//!
//! Writes an XGMML document: a single `<graph>` element with nodes for
//! every accession, typed `<att>` annotations, and edges from the reduced
//! similarity set.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use ssn_common::types::{AccessionId, AttributeValue, SimilarityEdge};
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::error::PipelineResult;

/// Per-node annotation map, keyed by display key (order is the caller's
/// responsibility — see the annotation schema's display ordering).
pub type NodeAnnotations = BTreeMap<String, AttributeValue>;

/// Strip non-printable control characters disallowed in XGMML attribute
/// values: `\x00-\x08`, `\x0B-\x0C`, `\x0E-\x1F`.
pub fn strip_control_chars(value: &str) -> String {
    value
        .chars()
        .filter(|&c| {
            let code = c as u32;
            !((0x00..=0x08).contains(&code) || (0x0B..=0x0C).contains(&code) || (0x0E..=0x1F).contains(&code))
        })
        .collect()
}

fn attribute_type(value: &AttributeValue) -> &'static str {
    match value {
        AttributeValue::Str(_) => "string",
        AttributeValue::Integer(_) => "integer",
        AttributeValue::Real(_) => "real",
        AttributeValue::List(_) => "list",
    }
}

fn write_att(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &AttributeValue) -> PipelineResult<()> {
    match value {
        AttributeValue::List(items) => {
            let mut container = BytesStart::new("att");
            container.push_attribute(("type", "list"));
            container.push_attribute(("name", name));
            writer.write_event(Event::Start(container))?;
            for item in items {
                let mut child = BytesStart::new("att");
                child.push_attribute(("type", "string"));
                child.push_attribute(("name", name.as_ref()));
                child.push_attribute(("value", strip_control_chars(item).as_str()));
                writer.write_event(Event::Empty(child))?;
            }
            writer.write_event(Event::End(BytesEnd::new("att")))?;
        },
        scalar => {
            let text = match scalar {
                AttributeValue::Str(s) => strip_control_chars(s),
                AttributeValue::Integer(i) => i.to_string(),
                AttributeValue::Real(r) => r.to_string(),
                AttributeValue::List(_) => unreachable!(),
            };
            let mut att = BytesStart::new("att");
            att.push_attribute(("type", attribute_type(scalar)));
            att.push_attribute(("name", name));
            att.push_attribute(("value", text.as_str()));
            writer.write_event(Event::Empty(att))?;
        },
    }
    Ok(())
}

/// Write the full XGMML document. Returns the rendered XML so callers can
/// apply the size guard before deciding whether to persist it.
pub fn write_xgmml(
    label: &str,
    database_version: &str,
    nodes: &[(AccessionId, NodeAnnotations)],
    edges: &[SimilarityEdge],
) -> PipelineResult<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Comment(BytesText::new(&format!("Database: {database_version}"))))?;

    let mut graph = BytesStart::new("graph");
    graph.push_attribute(("label", label));
    graph.push_attribute(("xmlns", "http://www.cs.rpi.edu/XGMML"));
    writer.write_event(Event::Start(graph))?;

    for (id, annotations) in nodes {
        let mut node = BytesStart::new("node");
        node.push_attribute(("id", id.as_str()));
        node.push_attribute(("label", id.as_str()));
        writer.write_event(Event::Start(node))?;
        for (key, value) in annotations {
            write_att(&mut writer, key, value)?;
        }
        writer.write_event(Event::End(BytesEnd::new("node")))?;
    }

    for edge in edges {
        let mut edge_start = BytesStart::new("edge");
        edge_start.push_attribute(("source", edge.a.as_str()));
        edge_start.push_attribute(("target", edge.b.as_str()));
        writer.write_event(Event::Start(edge_start))?;

        write_att(&mut writer, "%id", &AttributeValue::Real(edge.pident))?;
        write_att(&mut writer, "alignment_score", &AttributeValue::Real(edge.alignment_score() as f64))?;
        write_att(&mut writer, "alignment_len", &AttributeValue::Integer(edge.align_len as i64))?;

        writer.write_event(Event::End(BytesEnd::new("edge")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Size guard: when `edges.len()` exceeds `maxfull`, write a plain-text
/// notice instead of XGMML and still exit successfully.
pub fn write_network_or_notice(
    label: &str,
    database_version: &str,
    nodes: &[(AccessionId, NodeAnnotations)],
    edges: &[SimilarityEdge],
    maxfull: u64,
    out_path: &std::path::Path,
) -> PipelineResult<()> {
    if edges.len() as u64 > maxfull {
        std::fs::write(
            out_path,
            format!("Network not written: edge count {} exceeds maxfull {}\n", edges.len(), maxfull),
        )?;
        return Ok(());
    }
    let xml = write_xgmml(label, database_version, nodes, edges)?;
    std::fs::write(out_path, xml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_disallowed_control_chars() {
        let dirty = "abc\x01def\x0bghi";
        assert_eq!(strip_control_chars(dirty), "abcdefghi");
    }

    #[test]
    fn write_xgmml_contains_database_comment_and_nodes() {
        let mut annotations = NodeAnnotations::new();
        annotations.insert("Sequence_Length".to_string(), AttributeValue::Integer(120));
        let nodes = vec![(AccessionId::Real("A1".to_string()), annotations)];
        let edges = vec![];
        let xml = write_xgmml("test-network", "db-v1", &nodes, &edges).unwrap();
        assert!(xml.contains("Database: db-v1"));
        assert!(xml.contains("id=\"A1\""));
        assert!(xml.contains("Sequence_Length"));
    }

    #[test]
    fn write_xgmml_emits_edge_attributes() {
        let edges = vec![SimilarityEdge {
            a: AccessionId::Real("A".into()),
            b: AccessionId::Real("B".into()),
            pident: 90.0,
            align_len: 50,
            bitscore: 100.0,
            qlen: 300,
            slen: 300,
        }];
        let xml = write_xgmml("net", "db-v1", &[], &edges).unwrap();
        assert!(xml.contains("source=\"A\""));
        assert!(xml.contains("alignment_score"));
    }

    #[test]
    fn size_guard_writes_notice_instead_of_xgmml() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.xgmml");
        let edges = vec![SimilarityEdge {
            a: AccessionId::Real("A".into()),
            b: AccessionId::Real("B".into()),
            pident: 90.0,
            align_len: 50,
            bitscore: 100.0,
            qlen: 300,
            slen: 300,
        }];
        write_network_or_notice("net", "db-v1", &[], &edges, 0, &out_path).unwrap();
        let contents = std::fs::read_to_string(&out_path).unwrap();
        assert!(contents.starts_with("Network not written"));
    }
}

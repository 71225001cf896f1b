//! Cluster / Demux Bookkeeping
//!
//! Drives the external clusterer (CD-HIT), parses its output into a
//! representative→members table, and implements the three post-cluster
//! policies: demux (default), no-demux, and manual-CD-HIT.

use ssn_common::types::{AccessionId, ClusterTable, SimilarityEdge};
use std::collections::BTreeSet;

use crate::tools::ExternalTool;

/// Parse a CD-HIT `.clstr` file into a `ClusterTable`. Each cluster block
/// starts with `>Cluster N`; member lines are `N\t...>accession... [*]`
/// where `*` marks the representative.
pub fn parse_cdhit_clusters(text: &str) -> ClusterTable {
    let mut table = ClusterTable::default();
    let mut members: Vec<AccessionId> = Vec::new();
    let mut representative: Option<AccessionId> = None;

    let flush = |table: &mut ClusterTable, representative: &Option<AccessionId>, members: &[AccessionId]| {
        if let Some(rep) = representative {
            for member in members {
                table.insert(rep.clone(), member.clone());
            }
        }
    };

    for line in text.lines() {
        if line.starts_with('>') {
            flush(&mut table, &representative, &members);
            members.clear();
            representative = None;
            continue;
        }
        if let Some(accession) = extract_accession(line) {
            let is_rep = line.trim_end().ends_with('*');
            let id = AccessionId::Real(accession);
            if is_rep {
                representative = Some(id.clone());
            }
            members.push(id);
        }
    }
    flush(&mut table, &representative, &members);

    table
}

fn extract_accession(line: &str) -> Option<String> {
    let start = line.find(">")? + 1;
    let rest = &line[start..];
    let end = rest.find("...").unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Run CD-HIT against the full sequence set with `(sim, lengthdif)`
/// parameters.
pub fn run_cdhit(
    tool: &ExternalTool,
    input_fasta: &std::path::Path,
    output_prefix: &std::path::Path,
    sim: f64,
    lengthdif: f64,
) -> Result<ClusterTable, crate::error::PipelineError> {
    tool.run(&[
        "-i".to_string(),
        input_fasta.display().to_string(),
        "-o".to_string(),
        output_prefix.display().to_string(),
        "-c".to_string(),
        format!("{sim}"),
        "-s".to_string(),
        format!("{lengthdif}"),
    ])?;

    let clstr_path = output_prefix.with_extension("clstr");
    let text = std::fs::read_to_string(&clstr_path)?;
    Ok(parse_cdhit_clusters(&text))
}

/// Demux mode (default): expand every representative-level edge to the
/// cartesian product of the two clusters' members, minus self-loops, with
/// the original score preserved.
pub fn demux_edges(edges: &[SimilarityEdge], table: &ClusterTable) -> Vec<SimilarityEdge> {
    let mut out = Vec::new();
    for edge in edges {
        let members_a = table.members_of(&edge.a);
        let members_b = table.members_of(&edge.b);
        let members_a = if members_a.is_empty() { BTreeSet::from([edge.a.clone()]) } else { members_a };
        let members_b = if members_b.is_empty() { BTreeSet::from([edge.b.clone()]) } else { members_b };

        for a in &members_a {
            for b in &members_b {
                if a == b {
                    continue;
                }
                let (lo, hi) = if a.as_str() < b.as_str() { (a, b) } else { (b, a) };
                out.push(SimilarityEdge {
                    a: lo.clone(),
                    b: hi.clone(),
                    pident: edge.pident,
                    align_len: edge.align_len,
                    bitscore: edge.bitscore,
                    qlen: edge.qlen,
                    slen: edge.slen,
                });
            }
        }
    }
    out
}

/// No-demux mode: search still ran on representatives only; duplicate
/// edges between representatives are collapsed, keeping one per unordered
/// pair.
pub fn removedups(edges: Vec<SimilarityEdge>) -> Vec<SimilarityEdge> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for edge in edges {
        let key = (edge.a.clone(), edge.b.clone());
        if seen.insert(key) {
            out.push(edge);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CLSTR: &str = ">Cluster 0\n0\t300aa, >A1... *\n1\t295aa, >A2... at 98.00%\n>Cluster 1\n0\t150aa, >A3... *\n";

    #[test]
    fn parses_cdhit_clusters_with_representative() {
        let table = parse_cdhit_clusters(SAMPLE_CLSTR);
        let rep = AccessionId::Real("A1".to_string());
        assert!(table.representatives().any(|r| r == &rep));
        assert_eq!(table.members_of(&rep).len(), 2);
    }

    #[test]
    fn demux_expands_cartesian_product_minus_self_loops() {
        let mut table = ClusterTable::default();
        table.insert(AccessionId::Real("R1".into()), AccessionId::Real("R1".into()));
        table.insert(AccessionId::Real("R1".into()), AccessionId::Real("M1".into()));
        table.insert(AccessionId::Real("R2".into()), AccessionId::Real("R2".into()));
        table.insert(AccessionId::Real("R2".into()), AccessionId::Real("M2".into()));

        let edges = vec![SimilarityEdge {
            a: AccessionId::Real("R1".into()),
            b: AccessionId::Real("R2".into()),
            pident: 90.0,
            align_len: 50,
            bitscore: 100.0,
            qlen: 300,
            slen: 300,
        }];

        let expanded = demux_edges(&edges, &table);
        assert_eq!(expanded.len(), 4);
    }

    #[test]
    fn removedups_keeps_one_edge_per_pair() {
        let a = AccessionId::Real("A".into());
        let b = AccessionId::Real("B".into());
        let edges = vec![
            SimilarityEdge { a: a.clone(), b: b.clone(), pident: 90.0, align_len: 50, bitscore: 100.0, qlen: 100, slen: 100 },
            SimilarityEdge { a: a.clone(), b: b.clone(), pident: 80.0, align_len: 40, bitscore: 90.0, qlen: 100, slen: 100 },
        ];
        assert_eq!(removedups(edges).len(), 1);
    }
}

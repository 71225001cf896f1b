//! Annotation Loader
//!
//! Parses the tab-structured annotation file into per-accession key/value
//! blocks, classifies list-valued vs scalar attributes per schema, and
//! orders the discovered keys by the schema's canonical display order.

use ssn_common::types::AttributeValue;
use std::collections::BTreeMap;

/// The annotation schema: canonical display order plus which keys are
/// list-valued (comma-delimited) vs scalar.
#[derive(Debug, Clone)]
pub struct AnnotationSchema {
    pub display_order: Vec<String>,
    pub list_keys: std::collections::BTreeSet<String>,
}

impl AnnotationSchema {
    pub fn new(display_order: Vec<String>, list_keys: Vec<String>) -> Self {
        Self { display_order, list_keys: list_keys.into_iter().collect() }
    }

    fn rank(&self, key: &str) -> usize {
        self.display_order.iter().position(|k| k == key).unwrap_or(self.display_order.len())
    }

    /// The stock display order/list-key classification for the annotation
    /// keys this pipeline recognizes without further configuration.
    pub fn default_schema() -> Self {
        Self::new(
            vec![
                "Description".to_string(),
                "Organism".to_string(),
                "Taxonomy_ID".to_string(),
                "PFAM".to_string(),
                "IPRO".to_string(),
                "GENE3D".to_string(),
                "SSF".to_string(),
                "Sequence_Length".to_string(),
            ],
            vec!["PFAM".to_string(), "IPRO".to_string(), "GENE3D".to_string(), "SSF".to_string()],
        )
    }
}

pub type AnnotationTable = BTreeMap<String, Vec<(String, AttributeValue)>>;

/// Parse the tab-structured annotation file: an accession line opens a
/// block, subsequent `\tkey\tvalue` lines (leading whitespace) belong to it.
pub fn parse_annotations(text: &str, schema: &AnnotationSchema) -> AnnotationTable {
    let mut table = AnnotationTable::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if line.starts_with(char::is_whitespace) {
            let Some(accession) = current.clone() else { continue };
            let mut parts = line.trim_start().splitn(2, '\t');
            let Some(key) = parts.next() else { continue };
            let raw_value = parts.next().unwrap_or("");

            let value = if raw_value.is_empty() {
                AttributeValue::Str("None".to_string())
            } else if schema.list_keys.contains(key) {
                AttributeValue::List(raw_value.split(',').map(|s| s.trim().to_string()).collect())
            } else if let Ok(i) = raw_value.parse::<i64>() {
                AttributeValue::Integer(i)
            } else if let Ok(r) = raw_value.parse::<f64>() {
                AttributeValue::Real(r)
            } else {
                AttributeValue::Str(raw_value.to_string())
            };

            table.entry(accession).or_default().push((key.to_string(), value));
        } else if !line.trim().is_empty() {
            current = Some(line.trim().to_string());
            table.entry(line.trim().to_string()).or_default();
        }
    }

    for entries in table.values_mut() {
        entries.sort_by_key(|(key, _)| schema.rank(key));
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AnnotationSchema {
        AnnotationSchema::new(
            vec!["Organism".to_string(), "PFAM".to_string(), "Description".to_string()],
            vec!["PFAM".to_string()],
        )
    }

    #[test]
    fn parses_accession_block_with_scalar_and_list_values() {
        let text = "A1\n\tDescription\tsome protein\n\tPFAM\tPF00001, PF00002\n\tOrganism\tHomo sapiens\n";
        let table = parse_annotations(text, &schema());
        let entries = &table["A1"];
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "Organism");
        assert_eq!(entries[1].0, "PFAM");
        assert!(matches!(&entries[1].1, AttributeValue::List(items) if items.len() == 2));
    }

    #[test]
    fn empty_values_become_none() {
        let text = "A1\n\tDescription\t\n";
        let table = parse_annotations(text, &schema());
        assert!(matches!(&table["A1"][0].1, AttributeValue::Str(s) if s == "None"));
    }

    #[test]
    fn unknown_keys_are_placed_at_end() {
        let text = "A1\n\tUnknownKey\tvalue\n\tOrganism\tHomo sapiens\n";
        let table = parse_annotations(text, &schema());
        let entries = &table["A1"];
        assert_eq!(entries.last().unwrap().0, "UnknownKey");
    }

    #[test]
    fn multiple_accession_blocks() {
        let text = "A1\n\tOrganism\tHomo sapiens\nA2\n\tOrganism\tMus musculus\n";
        let table = parse_annotations(text, &schema());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn default_schema_orders_pfam_as_a_list() {
        let schema = AnnotationSchema::default_schema();
        assert!(schema.list_keys.contains("PFAM"));
        assert!(schema.rank("Description") < schema.rank("Sequence_Length"));
    }
}

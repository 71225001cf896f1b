//! FASTA Header Parser
//!
//! A streaming line-oriented parser with three externally observable
//! states per input line: `HeaderContinuation`, `Flush` (just transitioned
//! from header to sequence region — emit the current record), `Sequence`.
//! Recognizes multiple UniProt-shaped tokens inside a
//! single header (common in merged FASTAs from `>sp|P00001|FOO sp|P00002|BAR`
//! style duplicate entries).

use regex::Regex;
use ssn_common::types::{AccessionId, SequenceEntry, SequenceSource};
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn uniprot_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[|:\s])([A-NR-Z][0-9][A-Z0-9]{3}[0-9]|[OPQ][0-9][A-Z0-9]{3}[0-9])(?:[|:\s]|$)")
            .expect("static regex is valid")
    })
}

/// One observable line-classification state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    HeaderContinuation,
    Flush,
    Sequence,
}

/// A parsed header: every UniProt ID found, paired with the token it was
/// extracted alongside, plus everything else non-UniProt.
#[derive(Debug, Clone, Default)]
pub struct ParsedHeader {
    pub uniprot_ids: Vec<(String, Option<String>)>,
    pub duplicates: std::collections::BTreeMap<String, Vec<String>>,
    pub other_ids: BTreeSet<String>,
    pub raw_headers: String,
}

fn parse_header_line(line: &str) -> ParsedHeader {
    let mut parsed = ParsedHeader { raw_headers: line.to_string(), ..Default::default() };
    let mut seen_counts: std::collections::BTreeMap<String, u32> = std::collections::BTreeMap::new();

    for token in line.trim_start_matches('>').split(['|', ' ', '\t']) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if uniprot_token_re().is_match(&format!(" {token} ")) && is_uniprot_shaped(token) {
            *seen_counts.entry(token.to_string()).or_insert(0) += 1;
            parsed.uniprot_ids.push((token.to_string(), None));
        } else {
            parsed.other_ids.insert(token.to_string());
        }
    }

    for (id, count) in seen_counts {
        if count > 1 {
            let others: Vec<String> = parsed.other_ids.iter().cloned().collect();
            parsed.duplicates.insert(id, others);
        }
    }

    parsed
}

fn is_uniprot_shaped(token: &str) -> bool {
    let chars: Vec<char> = token.chars().collect();
    if !(6..=10).contains(&chars.len()) {
        return false;
    }
    chars.iter().all(|c| c.is_ascii_alphanumeric())
        && matches!(chars[0], 'A'..='N' | 'R'..='Z' | 'O' | 'P' | 'Q')
        && chars[1].is_ascii_digit()
}

/// Counter for minting synthetic `zzzzzNN` IDs, unique per parser run.
#[derive(Debug, Default)]
pub struct SyntheticIdAllocator {
    next: u64,
}

impl SyntheticIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// `zzzzzNN`: fixed leading `z`-padding so synthetic IDs sort after
    /// real accessions lexicographically and are visually distinguishable.
    pub fn next_id(&mut self) -> AccessionId {
        let id = format!("zzzzz{}", self.next);
        self.next += 1;
        AccessionId::Synthetic(id)
    }
}

/// Result of parsing one full FASTA input: per-record metadata plus a
/// filtered FASTA body containing only unmatched (synthetic-ID) sequences.
#[derive(Debug, Default)]
pub struct HeaderParseResult {
    pub entries: Vec<SequenceEntry>,
    pub filtered_fasta: String,
}

/// Parse a full FASTA text, emitting metadata for every record and
/// retaining sequence bytes only for records with no UniProt match.
pub fn parse_fasta(text: &str) -> HeaderParseResult {
    let mut result = HeaderParseResult::default();
    let mut allocator = SyntheticIdAllocator::new();

    let mut current_header: Option<ParsedHeader> = None;
    let mut current_body = String::new();

    let flush = |header: ParsedHeader,
                 body: &str,
                 allocator: &mut SyntheticIdAllocator,
                 result: &mut HeaderParseResult| {
        let seq_length = body.len() as u32;
        if header.uniprot_ids.is_empty() {
            let id = allocator.next_id();
            result.entries.push(SequenceEntry {
                id: id.clone(),
                description: Some(SequenceEntry::truncate_description(&header.raw_headers)),
                query_ids: [header.raw_headers.clone()].into_iter().collect(),
                other_ids: header.other_ids.clone(),
                seq_length,
                src: SequenceSource::UserFasta,
            });
            result.filtered_fasta.push_str(&format!(">{}\n{}\n", id.as_str(), body));
        } else {
            for (uniprot_id, _) in &header.uniprot_ids {
                result.entries.push(SequenceEntry {
                    id: AccessionId::Real(uniprot_id.clone()),
                    description: Some(SequenceEntry::truncate_description(&header.raw_headers)),
                    query_ids: [header.raw_headers.clone()].into_iter().collect(),
                    other_ids: header.other_ids.clone(),
                    seq_length,
                    src: SequenceSource::UserFasta,
                });
            }
            // Matched sequences are discarded here: the canonical content
            // is fetched from the reference blob by accession.
        }
    };

    for line in text.lines() {
        let state = if line.starts_with('>') {
            if current_header.is_some() { LineState::Flush } else { LineState::HeaderContinuation }
        } else {
            LineState::Sequence
        };

        match state {
            LineState::Flush => {
                if let Some(header) = current_header.take() {
                    flush(header, &current_body, &mut allocator, &mut result);
                }
                current_body.clear();
                current_header = Some(parse_header_line(line));
            },
            LineState::HeaderContinuation => {
                current_header = Some(parse_header_line(line));
            },
            LineState::Sequence => {
                current_body.push_str(line.trim());
            },
        }
    }
    if let Some(header) = current_header.take() {
        flush(header, &current_body, &mut allocator, &mut result);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_synthetic_id_to_unmatched_sequence() {
        let fasta = ">custom_xyz\nMKVLAA\n";
        let result = parse_fasta(fasta);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].id, AccessionId::Synthetic("zzzzz1".to_string()));
        assert!(result.filtered_fasta.contains("zzzzz1"));
    }

    #[test]
    fn retains_uniprot_id_and_discards_sequence_body() {
        let fasta = ">sp|P00001|FOO_BAR some description\nMKVLAA\n";
        let result = parse_fasta(fasta);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].id, AccessionId::Real("P00001".to_string()));
        assert!(!result.filtered_fasta.contains("P00001"));
    }

    #[test]
    fn two_entries_one_matched_one_not() {
        let fasta = ">sp|P00001|FOO_BAR\nMKV\n>custom_xyz\nLAA\n";
        let result = parse_fasta(fasta);
        assert_eq!(result.entries.len(), 2);
        let synthetic_count = result.entries.iter().filter(|e| e.id.is_synthetic()).count();
        assert_eq!(synthetic_count, 1);
    }

    #[test]
    fn synthetic_ids_increment_and_sort_after_real() {
        let mut allocator = SyntheticIdAllocator::new();
        let a = allocator.next_id();
        let b = allocator.next_id();
        assert_eq!(a.as_str(), "zzzzz1");
        assert_eq!(b.as_str(), "zzzzz2");
        assert!(a.as_str() > "Z99999");
    }
}

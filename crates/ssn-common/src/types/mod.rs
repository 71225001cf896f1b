//! Domain types shared across the SSN builder: accessions, domain spans,
//! sequence entries, cluster tables, similarity edges, and the annotation
//! schema.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Checksum algorithm used to verify the reference FASTA blob / database
/// version markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
            ChecksumAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

/// A 1-based inclusive domain span `[start, end]`, `end >= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DomainSpan {
    pub start: u32,
    pub end: u32,
}

impl DomainSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Length of the span in residues (`end - start + 1`).
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The implicit full-length span used when domain mode is off.
    pub fn full_length(seq_length: u32) -> Self {
        Self::new(1, seq_length)
    }
}

impl std::fmt::Display for DomainSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Canonical accession identifier.
///
/// Either a real UniProt-like identifier (6-10 alphanumeric characters) or a
/// synthetic `zzzzzNN`-style identifier minted for a user sequence with no
/// UniProt match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessionId {
    Real(String),
    Synthetic(String),
}

impl AccessionId {
    /// The textual form used on disk and in downstream tools. Both variants
    /// carry their own textual representation so synthetic IDs keep the
    /// sortable `z`-prefixed form without callers needing to branch.
    pub fn as_str(&self) -> &str {
        match self {
            AccessionId::Real(s) | AccessionId::Synthetic(s) => s.as_str(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, AccessionId::Synthetic(_))
    }
}

impl std::fmt::Display for AccessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a sequence entry's content originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceSource {
    UserFasta,
    Family,
    AccessionQuery,
}

/// A sequence entry: either known-UniProt (content fetched from the
/// reference FASTA blob by accession) or user-supplied (content carried
/// from the input FASTA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub id: AccessionId,
    /// Up to 200 chars of the original header, for user-supplied sequences.
    pub description: Option<String>,
    /// IDs by which the user referred to this sequence (provenance).
    pub query_ids: BTreeSet<String>,
    /// Additional non-UniProt identifiers found in the header.
    pub other_ids: BTreeSet<String>,
    pub seq_length: u32,
    pub src: SequenceSource,
}

impl SequenceEntry {
    pub fn truncate_description(raw: &str) -> String {
        raw.chars().take(200).collect()
    }
}

/// An accession record: canonical ID plus the union of all domain spans
/// accumulated across the family queries that surfaced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessionRecord {
    pub spans: Vec<DomainSpan>,
}

impl AccessionRecord {
    pub fn add_span(&mut self, span: DomainSpan) {
        self.spans.push(span);
    }

    /// Deduplicated spans, stable order.
    pub fn unique_spans(&self) -> Vec<DomainSpan> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for span in &self.spans {
            if seen.insert(*span) {
                out.push(*span);
            }
        }
        out
    }
}

/// Map of accession -> accumulated domain spans, accumulated across
/// identifier resolution, header parsing, and family expansion, then
/// consumed by selection.
pub type AccessionSpanMap = BTreeMap<AccessionId, AccessionRecord>;

/// Reasons an identifier failed to resolve, for the no-match report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoMatchReason {
    NotFoundIdMapping,
    NotFoundDatabase,
    Duplicate,
    Fastacmd,
}

impl std::fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NoMatchReason::NotFoundIdMapping => "NOT_FOUND_IDMAPPING",
            NoMatchReason::NotFoundDatabase => "NOT_FOUND_DATABASE",
            NoMatchReason::Duplicate => "DUPLICATE",
            NoMatchReason::Fastacmd => "FASTACMD",
        };
        write!(f, "{s}")
    }
}

/// A single no-match record: `<query_id>\t<REASON>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoMatchRecord {
    pub query_id: String,
    pub reason: NoMatchReason,
}

/// Representative -> member cluster table produced by the external
/// clusterer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterTable {
    pub members_by_representative: BTreeMap<AccessionId, BTreeSet<AccessionId>>,
}

impl ClusterTable {
    pub fn insert(&mut self, representative: AccessionId, member: AccessionId) {
        self.members_by_representative
            .entry(representative)
            .or_default()
            .insert(member);
    }

    pub fn representatives(&self) -> impl Iterator<Item = &AccessionId> {
        self.members_by_representative.keys()
    }

    pub fn members_of(&self, representative: &AccessionId) -> BTreeSet<AccessionId> {
        self.members_by_representative
            .get(representative)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_members(&self) -> usize {
        self.members_by_representative.values().map(|m| m.len()).sum()
    }
}

/// A raw, unreduced pairwise hit as produced by the external search tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub query: String,
    pub subject: String,
    pub pident: f64,
    pub align_len: u32,
    pub bitscore: f64,
    pub evalue: f64,
    pub qlen: u32,
    pub slen: u32,
}

/// A normalized similarity edge after alphabetizing + reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub a: AccessionId,
    pub b: AccessionId,
    pub pident: f64,
    pub align_len: u32,
    pub bitscore: f64,
    pub qlen: u32,
    pub slen: u32,
}

impl SimilarityEdge {
    /// `⌊-log10(qlen * slen) + bitscore * log10(2)⌋`.
    pub fn alignment_score(&self) -> i64 {
        let product = self.qlen as f64 * self.slen as f64;
        let score = -product.log10() + self.bitscore * std::f64::consts::LOG10_2;
        score.floor() as i64
    }
}

/// A single annotation value: scalar or list-valued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Str(String),
    Integer(i64),
    Real(f64),
    List(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_span_length() {
        let span = DomainSpan::new(10, 50);
        assert_eq!(span.len(), 41);
    }

    #[test]
    fn domain_span_display() {
        assert_eq!(DomainSpan::new(1, 5).to_string(), "1:5");
    }

    #[test]
    fn accession_record_dedupes_spans() {
        let mut rec = AccessionRecord::default();
        rec.add_span(DomainSpan::new(1, 10));
        rec.add_span(DomainSpan::new(1, 10));
        rec.add_span(DomainSpan::new(20, 30));
        assert_eq!(rec.unique_spans().len(), 2);
    }

    #[test]
    fn cluster_table_counts_members() {
        let mut table = ClusterTable::default();
        table.insert(AccessionId::Real("A1".into()), AccessionId::Real("A1".into()));
        table.insert(AccessionId::Real("A1".into()), AccessionId::Real("A2".into()));
        assert_eq!(table.total_members(), 2);
    }

    #[test]
    fn alignment_score_matches_expected_formula() {
        let edge = SimilarityEdge {
            a: AccessionId::Real("A".into()),
            b: AccessionId::Real("B".into()),
            pident: 90.0,
            align_len: 50,
            bitscore: 100.0,
            qlen: 300,
            slen: 300,
        };
        let expected =
            (-(300.0_f64 * 300.0).log10() + 100.0 * std::f64::consts::LOG10_2).floor() as i64;
        assert_eq!(edge.alignment_score(), expected);
    }
}

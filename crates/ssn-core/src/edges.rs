//! Edge Reducer
//!
//! From a raw pairwise hit table, keeps one normalized edge per unordered
//! pair with the best score.

use ssn_common::types::{AccessionId, RawHit, SimilarityEdge};
use std::collections::BTreeMap;

/// Alphabetize: normalize so the lexicographically smaller accession is in
/// column `a`; drop self-hits. Idempotent.
pub fn alphabetize(hits: &[RawHit]) -> Vec<SimilarityEdge> {
    hits.iter()
        .filter(|hit| hit.query != hit.subject)
        .map(|hit| {
            let (a, b) = if hit.query < hit.subject { (&hit.query, &hit.subject) } else { (&hit.subject, &hit.query) };
            SimilarityEdge {
                a: AccessionId::Real(a.clone()),
                b: AccessionId::Real(b.clone()),
                pident: hit.pident,
                align_len: hit.align_len,
                bitscore: hit.bitscore,
                qlen: hit.qlen,
                slen: hit.slen,
            }
        })
        .collect()
}

/// Sort by `(a, b, bitscore desc)`, reduce to the first row per `(a, b)`
/// group, then re-sort by `bitscore desc` for downstream consumers.
pub fn reduce(edges: Vec<SimilarityEdge>) -> Vec<SimilarityEdge> {
    let mut best: BTreeMap<(AccessionId, AccessionId), SimilarityEdge> = BTreeMap::new();

    for edge in edges {
        let key = (edge.a.clone(), edge.b.clone());
        match best.get(&key) {
            Some(existing) if existing.bitscore >= edge.bitscore => {},
            _ => {
                best.insert(key, edge);
            },
        }
    }

    let mut result: Vec<SimilarityEdge> = best.into_values().collect();
    result.sort_by(|a, b| b.bitscore.partial_cmp(&a.bitscore).unwrap_or(std::cmp::Ordering::Equal));
    result
}

/// Full pipeline: alphabetize then reduce.
pub fn alphabetize_and_reduce(hits: &[RawHit]) -> Vec<SimilarityEdge> {
    reduce(alphabetize(hits))
}

/// Parse the concatenated search-tool tab output (`catjob`'s output:
/// `qseqid sseqid pident length bitscore evalue qlen slen`) into raw hits.
/// Malformed lines are skipped rather than failing the whole batch.
pub fn parse_blast_tab(text: &str) -> Vec<RawHit> {
    text.lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            Some(RawHit {
                query: cols.next()?.to_string(),
                subject: cols.next()?.to_string(),
                pident: cols.next()?.parse().ok()?,
                align_len: cols.next()?.parse().ok()?,
                bitscore: cols.next()?.parse().ok()?,
                evalue: cols.next()?.parse().ok()?,
                qlen: cols.next()?.parse().ok()?,
                slen: cols.next()?.parse().ok()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(q: &str, s: &str, pident: f64, align_len: u32, bitscore: f64) -> RawHit {
        RawHit { query: q.to_string(), subject: s.to_string(), pident, align_len, bitscore, evalue: 1e-10, qlen: 300, slen: 300 }
    }

    #[test]
    fn drops_self_hits() {
        let hits = vec![hit("A", "A", 100.0, 50, 200.0)];
        assert!(alphabetize(&hits).is_empty());
    }

    #[test]
    fn alphabetizes_so_a_less_than_b() {
        let hits = vec![hit("B", "A", 90.0, 50, 100.0)];
        let edges = alphabetize(&hits);
        assert_eq!(edges[0].a, AccessionId::Real("A".into()));
        assert_eq!(edges[0].b, AccessionId::Real("B".into()));
    }

    #[test]
    fn alphabetize_is_idempotent() {
        let hits = vec![hit("B", "A", 90.0, 50, 100.0)];
        let once = alphabetize(&hits);
        let raw_again: Vec<RawHit> = once
            .iter()
            .map(|e| RawHit { query: e.a.as_str().to_string(), subject: e.b.as_str().to_string(), pident: e.pident, align_len: e.align_len, bitscore: e.bitscore, evalue: 1e-10, qlen: e.qlen, slen: e.slen })
            .collect();
        let twice = alphabetize(&raw_again);
        assert_eq!(once.len(), twice.len());
        assert_eq!(once[0].a, twice[0].a);
        assert_eq!(once[0].b, twice[0].b);
    }

    #[test]
    fn reduce_keeps_best_scoring_row_per_pair() {
        // (B,A,90,50,100) and (A,B,85,60,90) reduce to exactly (A,B,90,50,100).
        let hits = vec![hit("B", "A", 90.0, 50, 100.0), hit("A", "B", 85.0, 60, 90.0)];
        let reduced = alphabetize_and_reduce(&hits);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].pident, 90.0);
        assert_eq!(reduced[0].align_len, 50);
        assert_eq!(reduced[0].bitscore, 100.0);
    }

    #[test]
    fn at_most_one_edge_per_unordered_pair() {
        let hits = vec![hit("A", "B", 1.0, 1, 10.0), hit("B", "A", 2.0, 2, 20.0), hit("A", "B", 3.0, 3, 5.0)];
        let reduced = alphabetize_and_reduce(&hits);
        assert_eq!(reduced.len(), 1);
    }

    #[test]
    fn parses_tab_separated_hit_rows() {
        let text = "A\tB\t90.5\t50\t100.2\t1e-30\t300\t310\nC\tD\t80.0\t40\t90.0\t1e-20\t200\t205\n";
        let hits = parse_blast_tab(text);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].query, "A");
        assert_eq!(hits[0].subject, "B");
        assert_eq!(hits[0].qlen, 300);
        assert_eq!(hits[1].slen, 205);
    }

    #[test]
    fn skips_malformed_rows() {
        let text = "A\tB\tnot-a-number\t50\t100.2\t1e-30\t300\t310\n";
        assert!(parse_blast_tab(text).is_empty());
    }
}

//! Sequence Selection Core
//!
//! Composes the outputs of identifier resolution, FASTA header parsing, and
//! family expansion: verifies accessions against the Pfam index,
//! deduplicates, applies the maxsequence guard, and applies the fraction
//! policy.

use rand::seq::SliceRandom;
use ssn_common::types::{AccessionId, AccessionSpanMap, DomainSpan, NoMatchRecord, NoMatchReason};
use ssn_refstore::reference_store::ReferenceStore;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

/// Final selection: the ordered accession list (post-fraction), the
/// authoritative span map, and every no-match record accumulated along
/// the way.
#[derive(Debug, Default)]
pub struct SelectionResult {
    pub accessions: Vec<AccessionId>,
    pub spans: AccessionSpanMap,
    pub no_matches: Vec<NoMatchRecord>,
}

/// Step 1-2: verify every candidate UniProt ID against the Pfam index,
/// recording `NOT_FOUND_DATABASE` misses.
pub async fn verify_accessions(
    store: &dyn ReferenceStore,
    candidate_ids: &[String],
    spans: &mut AccessionSpanMap,
    no_matches: &mut Vec<NoMatchRecord>,
) -> PipelineResult<()> {
    for id in candidate_ids {
        match store.verify_accession(id).await? {
            Some(hit) => {
                spans
                    .entry(AccessionId::Real(hit.accession.clone()))
                    .or_default()
                    .add_span(DomainSpan::new(hit.start, hit.end));
            },
            None => {
                no_matches.push(NoMatchRecord {
                    query_id: id.clone(),
                    reason: NoMatchReason::NotFoundDatabase,
                });
            },
        }
    }
    Ok(())
}

/// Step 3: enforce `maxsequence` (fatal: caller must write `.failed` and
/// abort) and record `DUPLICATE` for accessions seen from more than one
/// family source.
pub fn dedupe_and_check_capacity(
    spans: &AccessionSpanMap,
    source_counts: &std::collections::BTreeMap<AccessionId, u32>,
    maxsequence: u32,
    no_matches: &mut Vec<NoMatchRecord>,
) -> PipelineResult<Vec<AccessionId>> {
    for (id, count) in source_counts {
        if *count > 1 {
            no_matches.push(NoMatchRecord { query_id: id.as_str().to_string(), reason: NoMatchReason::Duplicate });
        }
    }

    let mut accessions: Vec<AccessionId> = spans.keys().cloned().collect();
    accessions.sort();

    if maxsequence > 0 && accessions.len() as u32 > maxsequence {
        warn!(count = accessions.len(), maxsequence, "accession count exceeds maxsequence");
        return Err(PipelineError::Validation(format!(
            "{} accessions exceeds maxsequence={}",
            accessions.len(),
            maxsequence
        )));
    }

    Ok(accessions)
}

/// Step 4: fraction policy. Keeps accession *i* iff `i mod k == 0`
/// (1-indexed) in sorted order for determinism, or uniform-random sampling
/// to the same cardinality when `random` is set. Output size is `⌊N/k⌋`.
pub fn apply_fraction(accessions: &[AccessionId], k: u32, random: bool) -> Vec<AccessionId> {
    if k <= 1 {
        return accessions.to_vec();
    }

    if random {
        let target = accessions.len() / k as usize;
        let mut rng = rand::thread_rng();
        let mut shuffled: Vec<AccessionId> = accessions.to_vec();
        shuffled.shuffle(&mut rng);
        shuffled.truncate(target);
        shuffled.sort();
        shuffled
    } else {
        accessions
            .iter()
            .enumerate()
            .filter(|(i, _)| (i + 1) as u32 % k == 0)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

/// Drive the full selection algorithm given already-expanded candidate sets
/// from identifier resolution, header parsing, and family expansion.
pub async fn select(
    store: &dyn ReferenceStore,
    candidate_ids: &[String],
    mut spans: AccessionSpanMap,
    source_counts: &std::collections::BTreeMap<AccessionId, u32>,
    maxsequence: u32,
    fraction: u32,
    random_fraction: bool,
) -> PipelineResult<SelectionResult> {
    let mut no_matches = Vec::new();

    verify_accessions(store, candidate_ids, &mut spans, &mut no_matches).await?;

    let deduped = dedupe_and_check_capacity(&spans, source_counts, maxsequence, &mut no_matches)?;
    let selected = apply_fraction(&deduped, fraction, random_fraction);

    info!(
        candidates = candidate_ids.len(),
        deduped = deduped.len(),
        selected = selected.len(),
        "sequence selection complete"
    );

    let selected_set: BTreeSet<&AccessionId> = selected.iter().collect();
    spans.retain(|id, _| selected_set.contains(id));

    Ok(SelectionResult { accessions: selected, spans, no_matches })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_one_keeps_everything() {
        let ids: Vec<AccessionId> = (1..=5).map(|i| AccessionId::Real(format!("A{i}"))).collect();
        assert_eq!(apply_fraction(&ids, 1, false).len(), 5);
    }

    #[test]
    fn fraction_k_keeps_floor_n_over_k() {
        let ids: Vec<AccessionId> = (1..=10).map(|i| AccessionId::Real(format!("A{i}"))).collect();
        let kept = apply_fraction(&ids, 3, false);
        assert_eq!(kept.len(), 10 / 3);
    }

    #[test]
    fn fraction_deterministic_keeps_every_kth() {
        let ids: Vec<AccessionId> = (1..=6).map(|i| AccessionId::Real(format!("A{i}"))).collect();
        let kept = apply_fraction(&ids, 2, false);
        assert_eq!(kept, vec![AccessionId::Real("A2".into()), AccessionId::Real("A4".into()), AccessionId::Real("A6".into())]);
    }

    #[test]
    fn random_fraction_matches_deterministic_cardinality() {
        let ids: Vec<AccessionId> = (1..=11).map(|i| AccessionId::Real(format!("A{i}"))).collect();
        let kept = apply_fraction(&ids, 3, true);
        assert_eq!(kept.len(), 11 / 3);
    }

    #[test]
    fn capacity_guard_rejects_oversized_set() {
        let mut spans = AccessionSpanMap::new();
        for i in 1..=5 {
            spans.insert(AccessionId::Real(format!("A{i}")), Default::default());
        }
        let counts = std::collections::BTreeMap::new();
        let mut no_matches = Vec::new();
        let result = dedupe_and_check_capacity(&spans, &counts, 3, &mut no_matches);
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_sources_recorded_but_included_once() {
        let mut spans = AccessionSpanMap::new();
        spans.insert(AccessionId::Real("A1".into()), Default::default());
        let mut counts = std::collections::BTreeMap::new();
        counts.insert(AccessionId::Real("A1".into()), 2);
        let mut no_matches = Vec::new();
        let result = dedupe_and_check_capacity(&spans, &counts, 0, &mut no_matches).unwrap();
        assert_eq!(result, vec![AccessionId::Real("A1".into())]);
        assert_eq!(no_matches.len(), 1);
        assert_eq!(no_matches[0].reason, NoMatchReason::Duplicate);
    }
}

//! Identifier Resolver
//!
//! Sniffs the shape of a user-supplied identifier and reverse-resolves it
//! to UniProt accessions through the reference store, without ever
//! silently dropping an unmatched ID or fabricating a match.

use crate::reference_store::{IdKind, ReferenceStore};
use regex::Regex;
use ssn_common::types::NoMatchReason;
use std::sync::OnceLock;
use tracing::info;

fn uniprot_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-NR-Z][0-9][A-Z0-9]{3}[0-9]$|^[OPQ][0-9][A-Z0-9]{3}[0-9]$").unwrap())
}

fn gi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(gi\||GI:)?\d+$").unwrap())
}

fn ensembl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ENS[A-Z]*[GTP]\d{11}$").unwrap())
}

/// Classify a raw query identifier's shape: sniffs the kind from the
/// string shape when the caller does not declare one.
pub fn sniff(id: &str) -> IdKind {
    if uniprot_re().is_match(id) {
        IdKind::UniProt
    } else if ensembl_re().is_match(id) {
        IdKind::Ensembl
    } else if gi_re().is_match(id) {
        IdKind::Gi
    } else {
        IdKind::Ncbi
    }
}

/// Outcome of resolving one batch of query IDs: IDs that mapped to a
/// UniProt accession, and IDs that didn't (turned into no-match records
/// by the caller with `NoMatchReason::NotFoundIdMapping`).
#[derive(Debug, Clone, Default)]
pub struct ResolvedIds {
    pub uniprot_ids: Vec<String>,
    pub unresolved: Vec<(String, NoMatchReason)>,
}

pub struct IdentifierResolver<'a> {
    store: &'a dyn ReferenceStore,
}

impl<'a> IdentifierResolver<'a> {
    pub fn new(store: &'a dyn ReferenceStore) -> Self {
        Self { store }
    }

    /// Resolve a batch of declared-kind-or-auto query IDs. When `kind` is
    /// `Auto`, each ID is sniffed individually so a mixed batch (e.g. GI
    /// numbers alongside UniProt accessions pasted into the same file) is
    /// still resolved correctly.
    pub async fn resolve(
        &self,
        kind: IdKind,
        ids: &[String],
    ) -> Result<ResolvedIds, crate::reference_store::RefStoreError> {
        let mut resolved = ResolvedIds::default();

        if matches!(kind, IdKind::Auto) {
            // Group by sniffed kind so each group can still be queried in one
            // batch call, preserving input order in the final output.
            for id in ids {
                let sniffed = sniff(id);
                let lookup = self.store.reverse_lookup(sniffed, std::slice::from_ref(id)).await?;
                if let Some(uid) = lookup.uniprot_ids.first() {
                    resolved.uniprot_ids.push(uid.clone());
                } else {
                    resolved.unresolved.push((id.clone(), NoMatchReason::NotFoundIdMapping));
                }
            }
        } else {
            let lookup = self.store.reverse_lookup(kind, ids).await?;
            resolved.uniprot_ids = lookup.uniprot_ids;
            for id in lookup.unmatched {
                resolved.unresolved.push((id, NoMatchReason::NotFoundIdMapping));
            }
        }

        info!(
            resolved = resolved.uniprot_ids.len(),
            unresolved = resolved.unresolved.len(),
            "identifier resolution complete"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_uniprot_accession() {
        assert_eq!(sniff("P12345"), IdKind::UniProt);
        assert_eq!(sniff("Q9Y6K9"), IdKind::UniProt);
    }

    #[test]
    fn sniffs_gi_number() {
        assert_eq!(sniff("gi|123456"), IdKind::Gi);
        assert_eq!(sniff("987654"), IdKind::Gi);
    }

    #[test]
    fn sniffs_ensembl() {
        assert_eq!(sniff("ENSG00000139618"), IdKind::Ensembl);
    }

    #[test]
    fn falls_back_to_ncbi() {
        assert_eq!(sniff("NP_000483.3"), IdKind::Ncbi);
    }

    #[tokio::test]
    async fn resolve_reports_unresolved_ids() {
        use crate::reference_store::InMemoryReferenceStore;
        let store = InMemoryReferenceStore::new().with_xref("P12345", "P12345");
        let resolver = IdentifierResolver::new(&store);
        let result = resolver
            .resolve(IdKind::Auto, &["P12345".to_string(), "Q99999".to_string()])
            .await
            .unwrap();
        assert_eq!(result.uniprot_ids, vec!["P12345".to_string()]);
        assert_eq!(result.unresolved.len(), 1);
        assert_eq!(result.unresolved[0].1, NoMatchReason::NotFoundIdMapping);
    }
}

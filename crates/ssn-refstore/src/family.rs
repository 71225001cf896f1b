//! Family Expander
//!
//! Expands an InterPro / Pfam / Gene3D / SSF family ID (or taxid, a
//! supplemented filter) into the `AccessionSpanMap` entries the sequence
//! selection core consumes.

use crate::reference_store::{FamilyKind, ReferenceStore};
use ssn_common::types::{AccessionId, AccessionSpanMap, DomainSpan};
use tracing::info;

/// One family query as specified on the command line
/// (`--ipro`/`--pfam`/`--gene3d`/`--ssf`, repeatable).
#[derive(Debug, Clone)]
pub struct FamilyQuery {
    pub kind: FamilyKind,
    pub id: String,
}

/// Expand a list of family queries plus an optional taxid filter into the
/// shared accession/span map, logging a running total after each query.
pub async fn expand_families(
    store: &dyn ReferenceStore,
    families: &[FamilyQuery],
    taxid: Option<&str>,
    map: &mut AccessionSpanMap,
) -> Result<(), crate::reference_store::RefStoreError> {
    for query in families {
        let members = store.family_members(query.kind, &query.id).await?;
        for member in &members {
            map.entry(AccessionId::Real(member.accession.clone()))
                .or_default()
                .add_span(DomainSpan::new(member.start, member.end));
        }
        info!(
            family_kind = ?query.kind,
            family_id = %query.id,
            added = members.len(),
            running_total = map.len(),
            "expanded family"
        );
    }

    if let Some(taxid) = taxid {
        let members = store.taxid_members(taxid).await?;
        for member in &members {
            map.entry(AccessionId::Real(member.accession.clone()))
                .or_default()
                .add_span(DomainSpan::new(member.start, member.end));
        }
        info!(taxid, added = members.len(), running_total = map.len(), "expanded taxid filter");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_store::{AccessionSpan, InMemoryReferenceStore};

    #[tokio::test]
    async fn expand_accumulates_spans_across_families() {
        let store = InMemoryReferenceStore::new()
            .with_family(
                FamilyKind::Pfam,
                "PF00001",
                vec![AccessionSpan { accession: "A1".into(), start: 1, end: 100 }],
            )
            .with_family(
                FamilyKind::InterPro,
                "IPR000001",
                vec![AccessionSpan { accession: "A1".into(), start: 50, end: 150 }],
            );

        let mut map = AccessionSpanMap::new();
        expand_families(
            &store,
            &[
                FamilyQuery { kind: FamilyKind::Pfam, id: "PF00001".to_string() },
                FamilyQuery { kind: FamilyKind::InterPro, id: "IPR000001".to_string() },
            ],
            None,
            &mut map,
        )
        .await
        .unwrap();

        let record = &map[&AccessionId::Real("A1".to_string())];
        assert_eq!(record.spans.len(), 2);
    }

    #[tokio::test]
    async fn expand_applies_taxid_filter() {
        let mut store = InMemoryReferenceStore::new();
        store.taxid_index.insert(
            "9606".to_string(),
            vec![AccessionSpan { accession: "A2".into(), start: 1, end: 50 }],
        );

        let mut map = AccessionSpanMap::new();
        expand_families(&store, &[], Some("9606"), &mut map).await.unwrap();

        assert!(map.contains_key(&AccessionId::Real("A2".to_string())));
    }
}

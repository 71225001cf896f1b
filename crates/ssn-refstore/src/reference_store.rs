//! The `ReferenceStore` capability interface
//!
//! The reference database is an opaque, read-only relational store, out of
//! scope in its own right. We depend on it only through this trait so the
//! rest of the pipeline can be unit-tested against
//! [`InMemoryReferenceStore`] instead of a live Postgres instance.
//!
//! Queries are always parameterized: the family ID and accession are
//! untrusted user input, so dynamic string interpolation into SQL is never
//! an option here.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// One of the four family-query tables in the reference store schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyKind {
    InterPro,
    Pfam,
    Gene3D,
    Ssf,
}

impl FamilyKind {
    pub fn table_name(self) -> &'static str {
        match self {
            FamilyKind::InterPro => "INTERPRO",
            FamilyKind::Pfam => "PFAM",
            FamilyKind::Gene3D => "GENE3D",
            FamilyKind::Ssf => "SSF",
        }
    }
}

/// A single `(accession, start, end)` triple returned by a family or taxid
/// lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessionSpan {
    pub accession: String,
    pub start: u32,
    pub end: u32,
}

/// The identifier kind an identifier-resolver reverse-lookup is sniffed or
/// declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Auto,
    UniProt,
    Ncbi,
    Ensembl,
    Gi,
}

/// Result of a reverse-lookup batch: resolved UniProt IDs, unmatched query
/// IDs, and the provenance map from UniProt ID back to every query ID that
/// resolved to it.
#[derive(Debug, Clone, Default)]
pub struct ReverseLookup {
    pub uniprot_ids: Vec<String>,
    pub unmatched: Vec<String>,
    pub reverse_map: HashMap<String, Vec<String>>,
}

#[derive(Debug, Error)]
pub enum RefStoreError {
    #[error("failed to open reference store: {0}")]
    Open(String),
    #[error("query failed: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, RefStoreError>;

/// Capability interface for the external reference database.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Equality lookup on `id` against one of the family tables.
    async fn family_members(&self, kind: FamilyKind, family_id: &str) -> Result<Vec<AccessionSpan>>;

    /// Equality lookup on `accession` against the Pfam index, used by
    /// sequence selection to verify accession-list/FASTA-header input.
    /// `None` means the accession was not found in Pfam.
    async fn verify_accession(&self, accession: &str) -> Result<Option<AccessionSpan>>;

    /// Reverse-map arbitrary query identifiers to UniProt IDs.
    async fn reverse_lookup(&self, kind: IdKind, ids: &[String]) -> Result<ReverseLookup>;

    /// Taxid filter over the family tables, returning the same
    /// `(accession, start, end)` query shape as a family lookup.
    async fn taxid_members(&self, taxid: &str) -> Result<Vec<AccessionSpan>>;

    /// Opaque version string of the underlying reference database, emitted
    /// verbatim in the XGMML `Database:` comment.
    async fn database_version(&self) -> Result<String>;
}

/// Parameterized-query Postgres implementation.
pub struct PgReferenceStore {
    pool: sqlx::PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::PgPool::connect(database_url)
            .await
            .map_err(|e| RefStoreError::Open(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn family_members(&self, kind: FamilyKind, family_id: &str) -> Result<Vec<AccessionSpan>> {
        // Table name is one of four fixed, non-attacker-controlled
        // constants; `family_id` is bound, never interpolated.
        let sql = format!(
            "SELECT accession, start, \"end\" FROM {} WHERE id = $1",
            kind.table_name()
        );
        let rows: Vec<(String, i32, i32)> = sqlx::query_as(&sql)
            .bind(family_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RefStoreError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(accession, start, end)| AccessionSpan {
                accession,
                start: start as u32,
                end: end as u32,
            })
            .collect())
    }

    async fn verify_accession(&self, accession: &str) -> Result<Option<AccessionSpan>> {
        let row: Option<(String, i32, i32)> = sqlx::query_as(
            "SELECT accession, start, \"end\" FROM PFAM WHERE accession = $1 LIMIT 1",
        )
        .bind(accession)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RefStoreError::Query(e.to_string()))?;

        Ok(row.map(|(accession, start, end)| AccessionSpan {
            accession,
            start: start as u32,
            end: end as u32,
        }))
    }

    async fn reverse_lookup(&self, kind: IdKind, ids: &[String]) -> Result<ReverseLookup> {
        let mut result = ReverseLookup::default();
        for id in ids {
            let table = match kind {
                IdKind::Auto | IdKind::UniProt => "UNIPROT_XREF",
                IdKind::Ncbi => "NCBI_XREF",
                IdKind::Ensembl => "ENSEMBL_XREF",
                IdKind::Gi => "GI_XREF",
            };
            let sql = format!("SELECT uniprot_id FROM {table} WHERE query_id = $1 LIMIT 1");
            let row: Option<(String,)> = sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RefStoreError::Query(e.to_string()))?;

            match row {
                Some((uniprot_id,)) => {
                    result.reverse_map.entry(uniprot_id.clone()).or_default().push(id.clone());
                    if !result.uniprot_ids.contains(&uniprot_id) {
                        result.uniprot_ids.push(uniprot_id);
                    }
                },
                None => result.unmatched.push(id.clone()),
            }
        }
        Ok(result)
    }

    async fn taxid_members(&self, taxid: &str) -> Result<Vec<AccessionSpan>> {
        let rows: Vec<(String, i32, i32)> = sqlx::query_as(
            "SELECT accession, start, \"end\" FROM INTERPRO WHERE taxid = $1",
        )
        .bind(taxid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RefStoreError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(accession, start, end)| AccessionSpan {
                accession,
                start: start as u32,
                end: end as u32,
            })
            .collect())
    }

    async fn database_version(&self) -> Result<String> {
        let row: (String,) = sqlx::query_as("SELECT version FROM DATABASE_VERSION LIMIT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RefStoreError::Query(e.to_string()))?;
        Ok(row.0)
    }
}

/// In-memory fake used by the pipeline's unit tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceStore {
    pub families: BTreeMap<(FamilyKind, String), Vec<AccessionSpan>>,
    pub pfam_index: BTreeMap<String, AccessionSpan>,
    pub xrefs: BTreeMap<String, String>,
    pub taxid_index: BTreeMap<String, Vec<AccessionSpan>>,
    pub version: String,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self {
            version: "test-db-1".to_string(),
            ..Default::default()
        }
    }

    pub fn with_family(mut self, kind: FamilyKind, id: &str, members: Vec<AccessionSpan>) -> Self {
        self.families.insert((kind, id.to_string()), members);
        self
    }

    pub fn with_pfam_entry(mut self, accession: &str, start: u32, end: u32) -> Self {
        self.pfam_index.insert(
            accession.to_string(),
            AccessionSpan { accession: accession.to_string(), start, end },
        );
        self
    }

    pub fn with_xref(mut self, query_id: &str, uniprot_id: &str) -> Self {
        self.xrefs.insert(query_id.to_string(), uniprot_id.to_string());
        self
    }
}

#[async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn family_members(&self, kind: FamilyKind, family_id: &str) -> Result<Vec<AccessionSpan>> {
        Ok(self
            .families
            .get(&(kind, family_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn verify_accession(&self, accession: &str) -> Result<Option<AccessionSpan>> {
        Ok(self.pfam_index.get(accession).cloned())
    }

    async fn reverse_lookup(&self, _kind: IdKind, ids: &[String]) -> Result<ReverseLookup> {
        let mut result = ReverseLookup::default();
        for id in ids {
            match self.xrefs.get(id) {
                Some(uniprot_id) => {
                    result.reverse_map.entry(uniprot_id.clone()).or_default().push(id.clone());
                    if !result.uniprot_ids.contains(uniprot_id) {
                        result.uniprot_ids.push(uniprot_id.clone());
                    }
                },
                None => result.unmatched.push(id.clone()),
            }
        }
        Ok(result)
    }

    async fn taxid_members(&self, taxid: &str) -> Result<Vec<AccessionSpan>> {
        Ok(self.taxid_index.get(taxid).cloned().unwrap_or_default())
    }

    async fn database_version(&self) -> Result<String> {
        Ok(self.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn family_lookup_returns_registered_members() {
        let store = InMemoryReferenceStore::new().with_family(
            FamilyKind::Pfam,
            "PF00001",
            vec![
                AccessionSpan { accession: "A1".into(), start: 1, end: 100 },
                AccessionSpan { accession: "A2".into(), start: 1, end: 120 },
            ],
        );
        let members = store.family_members(FamilyKind::Pfam, "PF00001").await.unwrap();
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn reverse_lookup_records_unmatched() {
        let store = InMemoryReferenceStore::new().with_xref("custom_xyz", "P00001");
        let result = store
            .reverse_lookup(IdKind::Auto, &["custom_xyz".to_string(), "unknown".to_string()])
            .await
            .unwrap();
        assert_eq!(result.uniprot_ids, vec!["P00001".to_string()]);
        assert_eq!(result.unmatched, vec!["unknown".to_string()]);
    }

    #[tokio::test]
    async fn reverse_lookup_collapses_duplicate_query_ids() {
        let store = InMemoryReferenceStore::new()
            .with_xref("q1", "P00001")
            .with_xref("q2", "P00001");
        let result = store
            .reverse_lookup(IdKind::Auto, &["q1".to_string(), "q2".to_string()])
            .await
            .unwrap();
        assert_eq!(result.uniprot_ids, vec!["P00001".to_string()]);
        assert_eq!(result.reverse_map["P00001"].len(), 2);
    }
}

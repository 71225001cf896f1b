//! External-tool wrapper around `fastacmd`-style accession-indexed
//! retrieval against the flat reference FASTA blob.
//!
//! The reference FASTA blob itself is out of scope — we only know how to
//! shell out to the tool that indexes it and how to interpret its output
//! and failure modes.

use ssn_common::types::{AccessionId, SequenceEntry, SequenceSource};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FastacmdError {
    #[error("failed to spawn fastacmd: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("fastacmd exited with status {0}")]
    NonZeroExit(i32),
}

/// One accession came back unmatched, with the literal reason fastacmd gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastacmdMiss {
    pub accession: String,
}

#[derive(Debug, Clone, Default)]
pub struct FastacmdBatchResult {
    pub entries: Vec<SequenceEntry>,
    pub misses: Vec<FastacmdMiss>,
}

/// Thin wrapper around the `fastacmd` binary: runs it, parses stdout as
/// FASTA, and recognizes its `ERROR: Entry "X" not found` diagnostic on
/// stderr so the no-match reason survives instead of becoming a bare
/// process failure.
pub struct Fastacmd {
    binary: String,
    database: String,
}

impl Fastacmd {
    pub fn new(binary: impl Into<String>, database: impl Into<String>) -> Self {
        Self { binary: binary.into(), database: database.into() }
    }

    /// Fetch a batch of accessions in one process invocation, batched in
    /// `perpass`-sized groups by the caller.
    pub fn fetch_batch(&self, accessions: &[String]) -> Result<FastacmdBatchResult, FastacmdError> {
        if accessions.is_empty() {
            return Ok(FastacmdBatchResult::default());
        }

        debug!(count = accessions.len(), "invoking fastacmd");
        let output = Command::new(&self.binary)
            .arg("-d")
            .arg(&self.database)
            .arg("-s")
            .arg(accessions.join(","))
            .output()?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let misses = parse_misses(&stderr);
        for miss in &misses {
            warn!(accession = %miss.accession, "fastacmd reported entry not found");
        }

        if !output.status.success() && misses.is_empty() {
            return Err(FastacmdError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let entries = parse_fasta(&stdout);
        Ok(FastacmdBatchResult { entries, misses })
    }
}

/// Recognizes fastacmd's `[fastacmd] ERROR: Entry "X" not found` line shape.
fn parse_misses(stderr: &str) -> Vec<FastacmdMiss> {
    let mut misses = Vec::new();
    for line in stderr.lines() {
        if let Some(start) = line.find("Entry \"") {
            let rest = &line[start + "Entry \"".len()..];
            if let Some(end) = rest.find('"') {
                if line.contains("not found") {
                    misses.push(FastacmdMiss { accession: rest[..end].to_string() });
                }
            }
        }
    }
    misses
}

/// Minimal FASTA parser for fastacmd's own output (one-line header, body
/// until the next `>` or EOF); this is intentionally not the general
/// header parser used for user-uploaded FASTA (see `ssn-core`'s header
/// parser, which must also recover other identifiers from the header).
fn parse_fasta(text: &str) -> Vec<SequenceEntry> {
    let mut entries = Vec::new();
    let mut current_id: Option<String> = None;
    let mut current_len: u32 = 0;

    for line in text.lines() {
        if let Some(header) = line.strip_prefix('>') {
            if let Some(id) = current_id.take() {
                entries.push(make_entry(&id, current_len));
            }
            current_id = header.split_whitespace().next().map(str::to_string);
            current_len = 0;
        } else {
            current_len += line.trim().len() as u32;
        }
    }
    if let Some(id) = current_id {
        entries.push(make_entry(&id, current_len));
    }
    entries
}

fn make_entry(id: &str, seq_length: u32) -> SequenceEntry {
    SequenceEntry {
        id: AccessionId::Real(id.to_string()),
        description: None,
        query_ids: Default::default(),
        other_ids: Default::default(),
        seq_length,
        src: SequenceSource::Family,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_not_found_entry() {
        let stderr = "[fastacmd] ERROR: Entry \"Q99999\" not found\n";
        let misses = parse_misses(stderr);
        assert_eq!(misses, vec![FastacmdMiss { accession: "Q99999".to_string() }]);
    }

    #[test]
    fn parses_fasta_body_lengths() {
        let fasta = ">P00001 some description\nMKV\nLAA\n>P00002\nMK\n";
        let entries = parse_fasta(fasta);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id.as_str(), "P00001");
        assert_eq!(entries[0].seq_length, 6);
        assert_eq!(entries[1].seq_length, 2);
    }

    #[test]
    fn no_misses_on_clean_stderr() {
        assert!(parse_misses("").is_empty());
    }
}

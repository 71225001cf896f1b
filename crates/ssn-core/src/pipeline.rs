//! Pipeline orchestrator
//!
//! Wires the pipeline stages together into one data flow: config/env
//! resolution into identifier resolution, header parsing, and family
//! expansion, into selection, into job-graph submission, with a pre-cluster
//! step and external search in between.
//!
//! The orchestrator is single-threaded and sequential: it resolves the
//! candidate sequence set, drives the pre-cluster step, then submits the
//! job graph and returns without waiting for completion. The
//! reduce/demux/annotate/write stages that run once the search tool has
//! produced `blastfinal.tab` live in [`finalize_network`], which the job
//! graph's rendered `graphs` stage script invokes on its own — the
//! orchestrator itself does not poll.

use ssn_common::types::{
    AccessionId, AccessionSpanMap, AttributeValue, ClusterTable, DomainSpan, NoMatchReason,
    NoMatchRecord, RawHit, SimilarityEdge,
};
use ssn_refstore::family::{expand_families, FamilyQuery};
use ssn_refstore::fastacmd::Fastacmd;
use ssn_refstore::identifiers::IdentifierResolver;
use ssn_refstore::reference_store::{FamilyKind, IdKind, ReferenceStore};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

use crate::config::{OnOff, PipelineConfig};
use crate::error::PipelineResult;
use crate::network::NodeAnnotations;
use crate::{annotations, cluster, edges, header_parser, selection};
use crate::job_graph::JobGraph;

/// Output of [`prepare_sequence_set`]: the final selection plus any
/// user-supplied FASTA content that still needs to be fetched/written.
pub struct PreparedSequences {
    pub selection: selection::SelectionResult,
    pub filtered_fasta: String,
    pub initial_count: usize,
}

/// Resolve whichever single input source `PipelineConfig::validate`
/// confirmed is configured into a candidate ID set, verify it, and apply
/// the fraction/maxsequence policy.
pub async fn prepare_sequence_set(
    config: &PipelineConfig,
    store: &dyn ReferenceStore,
) -> PipelineResult<PreparedSequences> {
    let mut spans = AccessionSpanMap::new();
    let mut source_counts: BTreeMap<AccessionId, u32> = BTreeMap::new();
    let mut candidate_ids: Vec<String> = Vec::new();
    let mut filtered_fasta = String::new();

    // Family expansion (--ipro/--pfam/--gene3d/--ssf, --taxid).
    let mut families = Vec::new();
    for id in &config.ipro {
        families.push(FamilyQuery { kind: FamilyKind::InterPro, id: id.clone() });
    }
    for id in &config.pfam {
        families.push(FamilyQuery { kind: FamilyKind::Pfam, id: id.clone() });
    }
    for id in &config.gene3d {
        families.push(FamilyQuery { kind: FamilyKind::Gene3D, id: id.clone() });
    }
    for id in &config.ssf {
        families.push(FamilyQuery { kind: FamilyKind::Ssf, id: id.clone() });
    }
    if !families.is_empty() || config.taxid.is_some() {
        expand_families(store, &families, config.taxid.as_deref(), &mut spans).await?;
        for id in spans.keys() {
            *source_counts.entry(id.clone()).or_insert(0) += 1;
        }
    }

    // Explicit accession list (--accession-id/--accession-file).
    if !config.accession_id.is_empty() || config.accession_file.is_some() {
        let mut ids = config.accession_id.clone();
        if let Some(path) = &config.accession_file {
            let text = std::fs::read_to_string(path)?;
            ids.extend(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
        }
        let resolver = IdentifierResolver::new(store);
        let resolved = resolver.resolve(IdKind::Auto, &ids).await?;
        for id in &resolved.uniprot_ids {
            candidate_ids.push(id.clone());
            *source_counts.entry(AccessionId::Real(id.clone())).or_insert(0) += 1;
        }
    }

    // User FASTA (--fasta-file/--use-fasta-headers).
    if let Some(path) = &config.fasta_file {
        let text = std::fs::read_to_string(path)?;
        let parsed = header_parser::parse_fasta(&text);
        filtered_fasta = parsed.filtered_fasta;
        for entry in &parsed.entries {
            match &entry.id {
                AccessionId::Real(id) => {
                    candidate_ids.push(id.clone());
                    *source_counts.entry(entry.id.clone()).or_insert(0) += 1;
                },
                AccessionId::Synthetic(_) => {
                    spans
                        .entry(entry.id.clone())
                        .or_default()
                        .add_span(DomainSpan::full_length(entry.seq_length));
                },
            }
        }
    }

    let initial_count = spans.len() + candidate_ids.len();

    let result = selection::select(
        store,
        &candidate_ids,
        spans,
        &source_counts,
        config.maxsequence,
        config.fraction,
        config.random_fraction,
    )
    .await?;

    Ok(PreparedSequences { selection: result, filtered_fasta, initial_count })
}

/// Emit `accession.txt` (one line per accession, or per `accession:start:end`
/// in domain mode), `no_accession_matches.txt`, and the optional
/// `--seq-count-file` diagnostic.
pub fn write_selection_artifacts(
    config: &PipelineConfig,
    prepared: &PreparedSequences,
) -> PipelineResult<()> {
    let mut accession_lines = String::new();
    for id in &prepared.selection.accessions {
        if config.domain.is_on() {
            if let Some(record) = prepared.selection.spans.get(id) {
                for span in record.unique_spans() {
                    accession_lines.push_str(&format!("{}:{}:{}\n", id.as_str(), span.start, span.end));
                }
                continue;
            }
        }
        accession_lines.push_str(&format!("{}\n", id.as_str()));
    }
    std::fs::write(&config.accession_output, accession_lines)?;

    write_no_match_file(&config.no_match_file, &prepared.selection.no_matches)?;

    if let Some(path) = &config.seq_count_file {
        let after_cluster = prepared.selection.accessions.len();
        let body = format!(
            "initial\t{}\nafter_fraction\t{}\nafter_cluster\t{}\nfinal\t{}\n",
            prepared.initial_count,
            prepared.selection.accessions.len(),
            after_cluster,
            prepared.selection.accessions.len(),
        );
        std::fs::write(path, body)?;
    }

    info!(
        accessions = prepared.selection.accessions.len(),
        no_matches = prepared.selection.no_matches.len(),
        "selection artifacts written"
    );
    Ok(())
}

fn no_match_line(record: &NoMatchRecord) -> String {
    format!("{}\t{}\n", record.query_id, record.reason)
}

fn write_no_match_file(path: &Path, records: &[NoMatchRecord]) -> PipelineResult<()> {
    let body: String = records.iter().map(no_match_line).collect();
    std::fs::write(path, body)?;
    Ok(())
}

/// Append further no-match records (e.g. fastacmd misses, discovered after
/// `no_accession_matches.txt` was first written) to an existing no-match
/// file rather than overwriting it.
fn append_no_match_records(path: &Path, records: &[NoMatchRecord]) -> PipelineResult<()> {
    if records.is_empty() {
        return Ok(());
    }
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        file.write_all(no_match_line(record).as_bytes())?;
    }
    Ok(())
}

/// Fetch the reference-blob content for every real accession in the
/// selection and combine it with any user-supplied synthetic-ID sequences,
/// writing `allsequences.fa` under the working directory. Accessions
/// fastacmd reports as not found are appended to `no_accession_matches.txt`
/// as `FASTACMD` no-match records rather than silently dropped.
pub fn write_sequence_fasta(
    config: &PipelineConfig,
    prepared: &PreparedSequences,
) -> PipelineResult<()> {
    let fastacmd = Fastacmd::new(&config.database.fastacmd_binary, config.database.fasta_blob_path.display().to_string());

    let real_accessions: Vec<String> = prepared
        .selection
        .accessions
        .iter()
        .filter(|id| !id.is_synthetic())
        .map(|id| id.as_str().to_string())
        .collect();

    let mut fasta = String::new();
    let mut fastacmd_misses = Vec::new();
    if !real_accessions.is_empty() {
        let batch = fastacmd.fetch_batch(&real_accessions)?;
        for miss in &batch.misses {
            info!(accession = %miss.accession, "fastacmd reported no entry for accession");
            fastacmd_misses.push(NoMatchRecord { query_id: miss.accession.clone(), reason: NoMatchReason::Fastacmd });
        }
    }
    fasta.push_str(&prepared.filtered_fasta);

    std::fs::create_dir_all(&config.tmp)?;
    std::fs::write(config.tmp.join("allsequences.fa"), fasta)?;
    append_no_match_records(&config.no_match_file, &fastacmd_misses)?;
    Ok(())
}

/// Manual-CD-HIT mode (`--cd-hit FILE`): instead of driving the clusterer
/// ourselves, treat the caller-supplied `.clstr` file as the new working
/// set. Narrows `prepared.selection` down to cluster representatives and
/// re-checks `maxsequence` against the smaller set, since the clustering
/// happens after the original selection was sized.
pub fn apply_manual_cd_hit(config: &PipelineConfig, prepared: &mut PreparedSequences) -> PipelineResult<ClusterTable> {
    let Some(path) = &config.cd_hit else {
        return Ok(ClusterTable::default());
    };

    let text = std::fs::read_to_string(path)?;
    let table = cluster::parse_cdhit_clusters(&text);

    let representatives: BTreeSet<&AccessionId> = table.representatives().collect();
    let narrowed: Vec<AccessionId> = prepared
        .selection
        .accessions
        .iter()
        .filter(|id| representatives.contains(id))
        .cloned()
        .collect();

    if config.maxsequence > 0 && narrowed.len() as u32 > config.maxsequence {
        return Err(crate::error::PipelineError::Validation(format!(
            "{} representative accessions exceeds maxsequence={} after manual cd-hit clustering",
            narrowed.len(),
            config.maxsequence
        )));
    }

    let narrowed_set: BTreeSet<&AccessionId> = narrowed.iter().collect();
    prepared.selection.spans.retain(|id, _| narrowed_set.contains(id));
    prepared.selection.accessions = narrowed;

    Ok(table)
}

/// Build the job graph DAG and submit it. Returns the graph so the caller
/// can inspect per-stage job IDs.
pub fn submit_job_graph(config: &PipelineConfig) -> PipelineResult<JobGraph> {
    let mut graph = JobGraph::build(config);
    graph.submit_all(config)?;
    Ok(graph)
}

/// Whether cluster membership is attached to nodes as a `Cluster_Representative`
/// attribute instead of being demultiplexed back to full member-level edges:
/// true for no-demux mode and for manual-CD-HIT mode, both of which keep the
/// search's representative-level node set as the final one.
fn attaches_cluster_metadata(config: &PipelineConfig) -> bool {
    config.no_demux || config.cd_hit.is_some()
}

/// Read whichever cluster table governs this run's post-search bookkeeping:
/// the manual `--cd-hit FILE` if supplied, else the pre-cluster stage's own
/// `.clstr` output if one was written, else `None` (no clustering occurred).
fn read_cluster_text(config: &PipelineConfig) -> PipelineResult<Option<String>> {
    if let Some(path) = &config.cd_hit {
        return Ok(Some(std::fs::read_to_string(path)?));
    }
    let precluster_path = config.tmp.join("precluster.clstr");
    if precluster_path.exists() {
        Ok(Some(std::fs::read_to_string(precluster_path)?))
    } else {
        Ok(None)
    }
}

fn reverse_representative_map(table: &ClusterTable) -> BTreeMap<String, AccessionId> {
    let mut map = BTreeMap::new();
    for (rep, members) in &table.members_by_representative {
        for member in members {
            map.insert(member.as_str().to_string(), rep.clone());
        }
    }
    map
}

/// Build the per-node annotation map: schema-driven attributes from the
/// annotation file, the domain-node `Sequence_Length` override, and (in
/// no-demux/manual-CD-HIT mode) the `Cluster_Representative` attribute.
fn build_nodes(
    config: &PipelineConfig,
    node_ids: &[AccessionId],
    annotation_table: &annotations::AnnotationTable,
    reverse_representative: &BTreeMap<String, AccessionId>,
) -> Vec<(AccessionId, NodeAnnotations)> {
    node_ids
        .iter()
        .map(|id| {
            let mut node_annotations = NodeAnnotations::new();
            if let Some(entries) = annotation_table.get(id.as_str()) {
                for (key, value) in entries {
                    node_annotations.insert(key.clone(), value.clone());
                }
            }
            if config.domain.is_on() && node_annotations.contains_key("Sequence_Length") {
                // Domain-node length override applies only to nodes whose ID
                // carries a `:start:end` suffix.
                if let Some((_, range)) = id.as_str().split_once(':') {
                    if let Some((start, end)) = range.split_once(':') {
                        if let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) {
                            node_annotations
                                .insert("Sequence_Length".to_string(), AttributeValue::Integer((end - start + 1) as i64));
                        }
                    }
                }
            }
            if let Some(rep) = reverse_representative.get(id.as_str()) {
                node_annotations.insert("Cluster_Representative".to_string(), AttributeValue::Str(rep.as_str().to_string()));
            }
            (id.clone(), node_annotations)
        })
        .collect()
}

fn encode_edges(edges: &[SimilarityEdge]) -> String {
    edges
        .iter()
        .map(|e| format!("{}\t{}\t{}\t{}\t{}\t{}\t{}\n", e.a.as_str(), e.b.as_str(), e.pident, e.align_len, e.bitscore, e.qlen, e.slen))
        .collect()
}

fn decode_edges(text: &str) -> Vec<SimilarityEdge> {
    text.lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            Some(SimilarityEdge {
                a: AccessionId::Real(cols.next()?.to_string()),
                b: AccessionId::Real(cols.next()?.to_string()),
                pident: cols.next()?.parse().ok()?,
                align_len: cols.next()?.parse().ok()?,
                bitscore: cols.next()?.parse().ok()?,
                qlen: cols.next()?.parse().ok()?,
                slen: cols.next()?.parse().ok()?,
            })
        })
        .collect()
}

/// Once the search stage has produced a raw hit table: reduce it to one
/// edge per pair, restore cluster-member edges (unless `--no-demux` or
/// manual-CD-HIT mode), load the annotation file, and write the final
/// network (or size-guard notice). All inputs are supplied in memory,
/// which makes this convenient to unit-test; the rendered job-graph
/// scripts instead drive the equivalent file-based
/// [`run_blastreduce_stage`]/[`run_demux_stage`]/[`run_graphs_stage`] steps.
pub fn finalize_network(
    config: &PipelineConfig,
    raw_hits: &[RawHit],
    cluster_text: Option<&str>,
    annotation_text: &str,
    annotation_schema: &annotations::AnnotationSchema,
    database_version: &str,
    node_ids: &[AccessionId],
) -> PipelineResult<()> {
    let reduced = edges::alphabetize_and_reduce(raw_hits);
    let cluster_table = cluster_text.map(cluster::parse_cdhit_clusters);
    let attach_cluster_metadata = attaches_cluster_metadata(config);

    let final_edges = match &cluster_table {
        Some(_) if attach_cluster_metadata => cluster::removedups(reduced),
        Some(table) => cluster::demux_edges(&reduced, table),
        None => reduced,
    };

    if config.blast.is_diamond() {
        if let Some(path) = &config.conv_ratio_file {
            let ratio = if raw_hits.is_empty() { 0.0 } else { final_edges.len() as f64 / raw_hits.len() as f64 };
            std::fs::write(path, format!("{ratio:.6}\n"))?;
        }
    }

    let annotation_table = annotations::parse_annotations(annotation_text, annotation_schema);
    let reverse_representative =
        if attach_cluster_metadata { cluster_table.as_ref().map(reverse_representative_map).unwrap_or_default() } else { BTreeMap::new() };

    let nodes = build_nodes(config, node_ids, &annotation_table, &reverse_representative);

    crate::network::write_network_or_notice(
        config.out.to_string_lossy().as_ref(),
        database_version,
        &nodes,
        &final_edges,
        config.maxfull,
        &config.out,
    )
}

/// `blastreduce` stage: alphabetize and reduce the `catjob`-concatenated
/// raw hit table (`blastfinal.tab`) into one edge per pair, persisted as
/// `blastreduce.edges` for the `demux` stage to pick up.
pub fn run_blastreduce_stage(config: &PipelineConfig) -> PipelineResult<()> {
    let hits_text = std::fs::read_to_string(config.tmp.join("blastfinal.tab"))?;
    let raw_hits = edges::parse_blast_tab(&hits_text);
    let reduced = edges::alphabetize_and_reduce(&raw_hits);
    std::fs::write(config.tmp.join("blastreduce.edges"), encode_edges(&reduced))?;
    Ok(())
}

/// `demux` stage: restore cluster-member edges over `blastreduce.edges`
/// (or collapse duplicate representative edges in no-demux/manual-CD-HIT
/// mode), persisted as `demux.edges` for the `graphs` stage.
pub fn run_demux_stage(config: &PipelineConfig) -> PipelineResult<()> {
    let reduced = decode_edges(&std::fs::read_to_string(config.tmp.join("blastreduce.edges"))?);
    let cluster_text = read_cluster_text(config)?;
    let attach_cluster_metadata = attaches_cluster_metadata(config);

    let final_edges = match &cluster_text {
        Some(_) if attach_cluster_metadata => cluster::removedups(reduced),
        Some(text) => cluster::demux_edges(&reduced, &cluster::parse_cdhit_clusters(text)),
        None => reduced,
    };

    if config.blast.is_diamond() {
        if let Some(path) = &config.conv_ratio_file {
            let raw_count = std::fs::read_to_string(config.tmp.join("blastfinal.tab"))
                .map(|text| edges::parse_blast_tab(&text).len())
                .unwrap_or(0);
            let ratio = if raw_count == 0 { 0.0 } else { final_edges.len() as f64 / raw_count as f64 };
            std::fs::write(path, format!("{ratio:.6}\n"))?;
        }
    }

    std::fs::write(config.tmp.join("demux.edges"), encode_edges(&final_edges))?;
    Ok(())
}

/// `graphs` stage: load `demux.edges` and the annotation file, attach
/// per-node annotations (and cluster metadata where applicable), and write
/// the final XGMML network (or size-guard notice).
pub async fn run_graphs_stage(config: &PipelineConfig, store: &dyn ReferenceStore) -> PipelineResult<()> {
    let final_edges = decode_edges(&std::fs::read_to_string(config.tmp.join("demux.edges"))?);

    let annotation_text = if config.meta_file.exists() { std::fs::read_to_string(&config.meta_file)? } else { String::new() };
    let schema = annotations::AnnotationSchema::default_schema();
    let annotation_table = annotations::parse_annotations(&annotation_text, &schema);

    let database_version = store.database_version().await?;

    let cluster_text = read_cluster_text(config)?;
    let attach_cluster_metadata = attaches_cluster_metadata(config);
    let reverse_representative = if attach_cluster_metadata {
        cluster_text.as_deref().map(|text| reverse_representative_map(&cluster::parse_cdhit_clusters(text))).unwrap_or_default()
    } else {
        BTreeMap::new()
    };

    let accession_text = std::fs::read_to_string(&config.accession_output)?;
    let node_ids: Vec<AccessionId> = accession_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| AccessionId::Real(l.to_string()))
        .collect();

    let nodes = build_nodes(config, &node_ids, &annotation_table, &reverse_representative);

    crate::network::write_network_or_notice(
        config.out.to_string_lossy().as_ref(),
        &database_version,
        &nodes,
        &final_edges,
        config.maxfull,
        &config.out,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, SchedulerKind, SearchTool};
    use ssn_refstore::reference_store::{AccessionSpan, InMemoryReferenceStore};
    use std::path::PathBuf;

    fn base_config(tmp: &Path) -> PipelineConfig {
        PipelineConfig {
            database: DatabaseConfig {
                url: "postgresql://localhost/ssn".to_string(),
                fasta_blob_path: tmp.join("reference.fa"),
                fastacmd_binary: "fastacmd".to_string(),
            },
            ipro: vec![],
            pfam: vec!["PF00001".to_string()],
            gene3d: vec![],
            ssf: vec![],
            accession_id: vec![],
            accession_file: None,
            fasta_file: None,
            use_fasta_headers: false,
            taxid: None,
            domain: OnOff::Off,
            fraction: 1,
            random_fraction: false,
            maxsequence: 0,
            maxlen: None,
            minlen: None,
            evalue: 1e-5,
            multiplex: OnOff::On,
            sim: 0.5,
            lengthdif: 0.9,
            cd_hit: None,
            no_demux: false,
            blast: SearchTool::BlastPlus,
            blasthits: 1000,
            np: 4,
            queue: "default".to_string(),
            memqueue: "default".to_string(),
            scheduler: SchedulerKind::Slurm,
            tmp: tmp.to_path_buf(),
            job_id: None,
            dryrun: true,
            out: tmp.join("output.xgmml"),
            meta_file: tmp.join("struct.out"),
            accession_output: tmp.join("accession.txt"),
            no_match_file: tmp.join("no_accession_matches.txt"),
            seq_count_file: Some(tmp.join("seq_count.txt")),
            conv_ratio_file: None,
            maxfull: 10_000_000,
        }
    }

    #[tokio::test]
    async fn prepare_sequence_set_expands_pfam_family() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path());
        let store = InMemoryReferenceStore::new().with_family(
            FamilyKind::Pfam,
            "PF00001",
            vec![
                AccessionSpan { accession: "A1".into(), start: 1, end: 100 },
                AccessionSpan { accession: "A2".into(), start: 1, end: 120 },
            ],
        );

        let prepared = prepare_sequence_set(&config, &store).await.unwrap();
        assert_eq!(prepared.selection.accessions.len(), 2);
    }

    #[test]
    fn write_selection_artifacts_emits_accession_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path());
        let mut spans = AccessionSpanMap::new();
        spans.insert(AccessionId::Real("A1".to_string()), Default::default());
        let prepared = PreparedSequences {
            selection: selection::SelectionResult {
                accessions: vec![AccessionId::Real("A1".to_string())],
                spans,
                no_matches: vec![],
            },
            filtered_fasta: String::new(),
            initial_count: 1,
        };

        write_selection_artifacts(&config, &prepared).unwrap();
        let contents = std::fs::read_to_string(&config.accession_output).unwrap();
        assert_eq!(contents, "A1\n");
    }

    #[test]
    fn finalize_network_reduces_and_writes_xgmml() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path());
        let hits = vec![RawHit {
            query: "B".into(),
            subject: "A".into(),
            pident: 90.0,
            align_len: 50,
            bitscore: 100.0,
            evalue: 1e-30,
            qlen: 300,
            slen: 300,
        }];
        let schema = annotations::AnnotationSchema::new(vec![], vec![]);
        let nodes = vec![AccessionId::Real("A".into()), AccessionId::Real("B".into())];

        finalize_network(&config, &hits, None, "", &schema, "test-db", &nodes).unwrap();
        let xml = std::fs::read_to_string(&config.out).unwrap();
        assert!(xml.contains("source=\"A\""));
    }
}

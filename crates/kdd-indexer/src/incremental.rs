//! Incremental driver over a version-control diff.

use crate::error::{IndexerError, Result};
use crate::indexer::{persist_document, prepare_document, relative_path, IndexerDeps, Prepared};
use crate::stats::IngestReport;
use chrono::Utc;
use kdd_domain::{Event, IndexLevel, IndexManifest, IndexStats, Structure};
use kdd_store::IndexLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

const MAX_CONCURRENT: usize = 16;

/// One changed file reported by the VCS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Repo-relative path (for renames, the new path).
    pub path: String,
    pub status: DiffStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
    Renamed { old: String },
}

/// Version-control boundary: current commit + diff between two refs.
pub trait VcsDiff {
    fn current_commit(&self) -> Result<Option<String>>;
    fn diff(&self, base: &str, head: &str) -> Result<Vec<DiffEntry>>;
}

#[derive(Default)]
pub struct IncrementalOptions {
    pub force: bool,
    /// Full scan even when a manifest exists.
    pub full: bool,
    pub domain: Option<String>,
}

/// Run an incremental (or first-time full) ingest of the spec tree.
///
/// `repo_root` is the VCS root, `specs_root` the directory holding the
/// layers. The artifact root is locked for the whole run. Per-file
/// failures don't stop the batch; they aggregate into the report.
pub async fn index_incremental(
    repo_root: &Path,
    specs_root: &Path,
    vcs: &dyn VcsDiff,
    deps: &IndexerDeps<'_>,
    options: &IncrementalOptions,
) -> Result<IngestReport> {
    let started = Instant::now();
    let _lock = IndexLock::acquire(deps.store.root())?;

    let mut report = IngestReport::default();
    let manifest = deps.store.read_manifest()?;
    let head = vcs.current_commit()?;

    let plan = build_plan(repo_root, specs_root, vcs, manifest.as_ref(), options, &mut report)?;

    // Deletions first, so a rename never collides with its old node id.
    for path in &plan.deletions {
        delete_file(path, deps, &mut report)?;
    }

    process_files(&plan.additions, specs_root, deps, options, &mut report).await?;

    // A full scan also purges artifacts whose source files are gone.
    if report.full_scan {
        for node in deps.store.read_all_nodes()? {
            if !repo_root.join(&node.source_file).exists() {
                delete_file(&node.source_file, deps, &mut report)?;
            }
        }
    }

    write_manifest(deps, manifest.as_ref(), head, options)?;

    report.time_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "ingest finished: {} indexed, {} up-to-date, {} skipped, {} deleted, {} errors in {} ms",
        report.indexed,
        report.up_to_date,
        report.skipped,
        report.deleted,
        report.errors.len(),
        report.time_ms
    );
    Ok(report)
}

struct Plan {
    additions: Vec<PathBuf>,
    deletions: Vec<String>,
}

fn build_plan(
    repo_root: &Path,
    specs_root: &Path,
    vcs: &dyn VcsDiff,
    manifest: Option<&IndexManifest>,
    options: &IncrementalOptions,
    report: &mut IngestReport,
) -> Result<Plan> {
    let base = manifest.and_then(|m| m.git_commit.clone());

    if options.full || base.is_none() {
        report.full_scan = true;
        return Ok(Plan {
            additions: scan_spec_tree(specs_root),
            deletions: Vec::new(),
        });
    }

    let base = base.unwrap_or_default();
    let entries = match vcs.diff(&base, "HEAD") {
        Ok(entries) => entries,
        Err(IndexerError::CommitNotFound(message)) => {
            log::warn!("base commit {base} not in history ({message}); falling back to full scan");
            report.full_scan = true;
            return Ok(Plan {
                additions: scan_spec_tree(specs_root),
                deletions: Vec::new(),
            });
        }
        Err(err) => return Err(err),
    };

    let spec_prefix = spec_prefix(repo_root, specs_root);
    let mut additions = Vec::new();
    let mut deletions = Vec::new();
    // Path-sorted processing keeps runs deterministic.
    let mut entries = entries;
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    for entry in entries {
        if !entry.path.starts_with(&spec_prefix) || !entry.path.ends_with(".md") {
            continue;
        }
        match entry.status {
            DiffStatus::Added | DiffStatus::Modified => {
                additions.push(repo_root.join(&entry.path));
            }
            DiffStatus::Deleted => deletions.push(entry.path),
            DiffStatus::Renamed { old } => {
                if old.starts_with(&spec_prefix) {
                    deletions.push(old);
                }
                additions.push(repo_root.join(&entry.path));
            }
        }
    }

    Ok(Plan {
        additions,
        deletions,
    })
}

fn spec_prefix(repo_root: &Path, specs_root: &Path) -> String {
    let mut prefix = specs_root
        .strip_prefix(repo_root)
        .unwrap_or(Path::new("specs"))
        .to_string_lossy()
        .replace('\\', "/");
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

fn scan_spec_tree(specs_root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(specs_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    files
}

fn delete_file(
    repo_relative: &str,
    deps: &IndexerDeps<'_>,
    report: &mut IngestReport,
) -> Result<()> {
    let document_id = Path::new(repo_relative)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| IndexerError::InvalidPath(repo_relative.to_string()))?;

    let deleted = deps.store.delete_document(&document_id)?;
    if let Some(node_id) = deleted.node_id {
        report.deleted += 1;
        if let Some(bus) = deps.bus {
            bus.publish(Event::DocumentDeleted {
                document_id,
                source_path: repo_relative.to_string(),
                node_id,
                deleted_at: Utc::now(),
            });
        }
    }
    Ok(())
}

async fn process_files(
    files: &[PathBuf],
    specs_root: &Path,
    deps: &IndexerDeps<'_>,
    options: &IncrementalOptions,
    report: &mut IngestReport,
) -> Result<()> {
    // Two inputs resolving to the same node id must not race; keep the
    // first occurrence only.
    let mut seen_stems: HashSet<String> = HashSet::new();
    let files: Vec<&PathBuf> = files
        .iter()
        .filter(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            seen_stems.insert(stem)
        })
        .collect();

    for batch in files.chunks(MAX_CONCURRENT) {
        let mut reads = Vec::with_capacity(batch.len());
        for path in batch {
            let path = (*path).clone();
            reads.push(tokio::spawn(async move {
                let bytes = tokio::fs::read(&path).await;
                (path, bytes)
            }));
        }

        for task in reads {
            let (path, bytes) = task
                .await
                .map_err(|e| IndexerError::Join(e.to_string()))?;
            let relative = relative_path(&path, specs_root);

            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(err) => {
                    report.errors.push((relative, err.to_string()));
                    continue;
                }
            };

            // Parse/extract/embed per file; writes stay on this task so the
            // edge log and manifest have a single writer.
            match prepare_document(&relative, &bytes, deps, options.force) {
                Ok(Prepared::Ready(prepared)) => {
                    let degraded = prepared.degraded;
                    match persist_document(*prepared, deps) {
                        Ok(_) => {
                            report.indexed += 1;
                            if degraded {
                                report.degraded += 1;
                            }
                        }
                        Err(err) => report.errors.push((relative, err.to_string())),
                    }
                }
                Ok(Prepared::UpToDate { .. }) => report.up_to_date += 1,
                Ok(Prepared::Skipped { .. }) => report.skipped += 1,
                Err(err) => report.errors.push((relative, err.to_string())),
            }
        }
    }
    Ok(())
}

fn write_manifest(
    deps: &IndexerDeps<'_>,
    previous: Option<&IndexManifest>,
    head: Option<String>,
    options: &IncrementalOptions,
) -> Result<()> {
    let nodes = deps.store.read_all_nodes()?;
    let edges = deps.store.read_edges()?;
    let embeddings = deps.store.read_all_embeddings()?;

    let mut domains: Vec<String> = nodes
        .iter()
        .filter_map(|n| n.domain.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if let Some(domain) = &options.domain {
        if !domains.contains(domain) {
            domains.push(domain.clone());
        }
    }
    domains.sort();

    let structure = if domains.len() > 1 {
        Structure::MultiDomain
    } else {
        Structure::SingleDomain
    };

    let (embedding_model, embedding_dimensions) = if deps.index_level >= IndexLevel::L2 {
        deps.embedder
            .map(|e| (Some(e.model_name().to_string()), Some(e.dimensions())))
            .unwrap_or((None, None))
    } else {
        (None, None)
    };

    let manifest = IndexManifest {
        version: previous
            .map(|m| m.version.clone())
            .unwrap_or_else(|| "1.0.0".to_string()),
        kdd_version: "1.0.0".to_string(),
        embedding_model,
        embedding_dimensions,
        indexed_at: Utc::now(),
        indexed_by: "kdd-index".to_string(),
        structure,
        index_level: deps.index_level,
        stats: IndexStats {
            nodes: nodes.len(),
            edges: edges.len(),
            embeddings: embeddings.len(),
            enrichments: 0,
        },
        domains,
        git_commit: head,
    };
    deps.store.write_manifest(&manifest)?;
    Ok(())
}

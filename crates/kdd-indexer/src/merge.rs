//! Merge engine: reconcile artifact roots from multiple producers.
//!
//! Nodes union by id; an id tombstoned in any source is removed
//! (delete-wins). Differing hashes for the same id resolve by
//! last-write-wins, ties by the greater hash. No partial merge survives a
//! failure: the output is written only after every source validates.

use chrono::Utc;
use kdd_domain::{
    resolve_node_conflict, ConflictWinner, Event, EventBus, GraphEdge, GraphNode, IndexLevel,
    IndexManifest, IndexStats, MergeStrategy, Structure,
};
use kdd_store::{ArtifactStore, IndexLock, LoadedIndex};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("INSUFFICIENT_SOURCES: need at least 2 indexes, got {0}")]
    InsufficientSources(usize),

    #[error("INCOMPATIBLE_VERSION: {0} and {1}")]
    IncompatibleVersion(String, String),

    #[error("INCOMPATIBLE_EMBEDDING_MODEL: {0} and {1}")]
    IncompatibleEmbeddingModel(String, String),

    #[error("INCOMPATIBLE_STRUCTURE")]
    IncompatibleStructure,

    #[error("CONFLICT_REJECTED: node {0} differs between sources")]
    ConflictRejected(String),

    #[error("source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: kdd_store::StoreError,
    },

    #[error("output: {0}")]
    Output(#[from] kdd_store::StoreError),
}

pub struct MergeOptions {
    pub strategy: MergeStrategy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::LastWriteWins,
        }
    }
}

#[derive(Debug)]
pub struct MergeReport {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_embeddings: usize,
    pub conflicts_resolved: usize,
    pub deletions_applied: usize,
}

/// Merge `sources` into `output`.
pub fn merge_indexes(
    sources: &[PathBuf],
    output: &Path,
    options: &MergeOptions,
    bus: Option<&EventBus>,
) -> Result<MergeReport, MergeError> {
    let started = Instant::now();
    if sources.len() < 2 {
        return Err(MergeError::InsufficientSources(sources.len()));
    }

    if let Some(bus) = bus {
        bus.publish(Event::MergeRequested {
            source_count: sources.len(),
            requested_at: Utc::now(),
        });
    }

    // 1. Load every source strictly; validate pairwise compatibility.
    let mut loaded: Vec<(PathBuf, LoadedIndex)> = Vec::with_capacity(sources.len());
    for path in sources {
        let store = ArtifactStore::new(path);
        let index = kdd_store::load_index(&store).map_err(|source| MergeError::Source {
            path: path.clone(),
            source,
        })?;
        loaded.push((path.clone(), index));
    }
    validate_compatibility(&loaded)?;

    // 2. Union node ids; delete-wins via tombstones from any source.
    let tombstoned: BTreeSet<String> = loaded
        .iter()
        .flat_map(|(_, idx)| idx.tombstones.iter().map(|t| t.node_id.clone()))
        .collect();

    let mut candidates: BTreeMap<String, Vec<(usize, &GraphNode)>> = BTreeMap::new();
    for (source_idx, (_, index)) in loaded.iter().enumerate() {
        for node in &index.nodes {
            candidates
                .entry(node.id.clone())
                .or_default()
                .push((source_idx, node));
        }
    }

    let mut deletions_applied = 0;
    candidates.retain(|id, _| {
        let keep = !tombstoned.contains(id);
        if !keep {
            deletions_applied += 1;
        }
        keep
    });

    // 3. Resolve per-id winners.
    let mut winners: BTreeMap<String, (usize, GraphNode)> = BTreeMap::new();
    let mut conflicts_resolved = 0;
    for (id, nodes) in &candidates {
        let distinct_hashes: BTreeSet<&str> =
            nodes.iter().map(|(_, n)| n.source_hash.as_str()).collect();

        if distinct_hashes.len() > 1 {
            if options.strategy == MergeStrategy::FailOnConflict {
                return Err(MergeError::ConflictRejected(id.clone()));
            }
            conflicts_resolved += 1;
        }

        let mut best = nodes[0];
        for candidate in &nodes[1..] {
            let winner = resolve_node_conflict(
                (&best.1.indexed_at, &best.1.source_hash),
                (&candidate.1.indexed_at, &candidate.1.source_hash),
            );
            if winner == ConflictWinner::Second {
                best = *candidate;
            }
        }
        winners.insert(id.clone(), (best.0, best.1.clone()));
    }

    // 4. Edge union keyed by (from, to, type); edges touching a tombstoned
    //    id are dropped.
    let mut edges: BTreeMap<(String, String, String), GraphEdge> = BTreeMap::new();
    for (_, index) in &loaded {
        for edge in &index.edges {
            if tombstoned.contains(&edge.from_node) || tombstoned.contains(&edge.to_node) {
                continue;
            }
            edges.entry(edge.key()).or_insert_with(|| edge.clone());
        }
    }

    // 5. Embeddings come from each winning node's source; losers' are
    //    discarded.
    let mut embeddings = Vec::new();
    for (_, (source_idx, node)) in &winners {
        let (path, _) = &loaded[*source_idx];
        let store = ArtifactStore::new(path);
        let mut batch = store
            .read_embeddings(node.document_id())
            .map_err(|source| MergeError::Source {
                path: path.clone(),
                source,
            })?;
        embeddings.append(&mut batch);
    }

    // 6. Write the consolidated output under its own lock.
    let out_store = ArtifactStore::new(output);
    let _lock = IndexLock::acquire(out_store.root())?;
    for (_, (_, node)) in &winners {
        out_store.write_node(node)?;
    }
    let edge_list: Vec<GraphEdge> = edges.into_values().collect();
    if !edge_list.is_empty() {
        out_store.append_edges(&edge_list)?;
    }
    let mut by_document: BTreeMap<String, Vec<kdd_domain::Embedding>> = BTreeMap::new();
    for embedding in embeddings {
        by_document
            .entry(embedding.document_id.clone())
            .or_default()
            .push(embedding);
    }
    let mut total_embeddings = 0;
    for batch in by_document.values() {
        total_embeddings += batch.len();
        out_store.write_embeddings(batch)?;
    }
    // Surviving tombstones keep delete-wins transitive across later merges.
    for (_, index) in &loaded {
        for tombstone in &index.tombstones {
            out_store.append_tombstone(tombstone)?;
        }
    }

    let manifest = merged_manifest(&loaded, winners.len(), edge_list.len(), total_embeddings);
    out_store.write_manifest(&manifest)?;

    let report = MergeReport {
        total_nodes: winners.len(),
        total_edges: edge_list.len(),
        total_embeddings,
        conflicts_resolved,
        deletions_applied,
    };

    if let Some(bus) = bus {
        bus.publish(Event::MergeCompleted {
            source_count: sources.len(),
            total_nodes: report.total_nodes,
            total_edges: report.total_edges,
            total_embeddings: report.total_embeddings,
            conflicts_resolved: report.conflicts_resolved,
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        });
    }

    log::info!(
        "merge completed: {} nodes, {} edges, {} embeddings, {} conflicts resolved",
        report.total_nodes,
        report.total_edges,
        report.total_embeddings,
        report.conflicts_resolved
    );
    Ok(report)
}

fn validate_compatibility(loaded: &[(PathBuf, LoadedIndex)]) -> Result<(), MergeError> {
    let first = &loaded[0].1.manifest;
    for (_, index) in &loaded[1..] {
        let other = &index.manifest;
        if first.major_version() != other.major_version() {
            return Err(MergeError::IncompatibleVersion(
                first.version.clone(),
                other.version.clone(),
            ));
        }
        if first.structure != other.structure {
            return Err(MergeError::IncompatibleStructure);
        }
    }

    let models: BTreeSet<&str> = loaded
        .iter()
        .filter_map(|(_, idx)| idx.manifest.embedding_model.as_deref())
        .collect();
    if models.len() > 1 {
        let mut it = models.into_iter();
        return Err(MergeError::IncompatibleEmbeddingModel(
            it.next().unwrap_or_default().to_string(),
            it.next().unwrap_or_default().to_string(),
        ));
    }
    Ok(())
}

fn merged_manifest(
    loaded: &[(PathBuf, LoadedIndex)],
    nodes: usize,
    edges: usize,
    embeddings: usize,
) -> IndexManifest {
    // The merged level is the weakest of the sources.
    let index_level = loaded
        .iter()
        .map(|(_, idx)| idx.manifest.index_level)
        .min()
        .unwrap_or(IndexLevel::L1);

    let (embedding_model, embedding_dimensions) = if index_level >= IndexLevel::L2 {
        loaded
            .iter()
            .find_map(|(_, idx)| {
                idx.manifest
                    .embedding_model
                    .clone()
                    .map(|m| (Some(m), idx.manifest.embedding_dimensions))
            })
            .unwrap_or((None, None))
    } else {
        (None, None)
    };

    let mut domains: BTreeSet<String> = BTreeSet::new();
    for (_, index) in loaded {
        domains.extend(index.manifest.domains.iter().cloned());
    }

    IndexManifest {
        version: loaded[0].1.manifest.version.clone(),
        kdd_version: loaded[0].1.manifest.kdd_version.clone(),
        embedding_model,
        embedding_dimensions,
        indexed_at: Utc::now(),
        indexed_by: "merge".to_string(),
        structure: if domains.len() > 1 {
            Structure::MultiDomain
        } else {
            loaded[0].1.manifest.structure
        },
        index_level,
        stats: IndexStats {
            nodes,
            edges,
            embeddings,
            enrichments: 0,
        },
        domains: domains.into_iter().collect(),
        git_commit: None,
    }
}

//! Single-document indexing pipeline.

use crate::error::Result;
use chrono::Utc;
use kdd_chunker::{embed_document, EmbedOutcome};
use kdd_domain::{
    Document, Embedding, EmbeddingModel, Event, EventBus, GraphEdge, GraphNode, IndexLevel,
};
use kdd_parser::{parse_document, ParseOutcome};
use kdd_store::ArtifactStore;
use std::path::Path;
use std::time::Instant;

/// Everything the pipeline needs besides the file itself.
pub struct IndexerDeps<'a> {
    pub store: &'a ArtifactStore,
    pub bus: Option<&'a EventBus>,
    pub embedder: Option<&'a dyn EmbeddingModel>,
    pub index_level: IndexLevel,
    pub domain: Option<String>,
}

impl IndexerDeps<'_> {
    fn publish(&self, event: Event) {
        if let Some(bus) = self.bus {
            bus.publish(event);
        }
    }
}

/// Per-document result reported back to the driver.
#[derive(Debug)]
pub enum DocumentOutcome {
    Indexed {
        node_id: String,
        edge_count: usize,
        embedding_count: usize,
        degraded: bool,
        warnings: Vec<String>,
    },
    /// Content hash unchanged; nothing re-written.
    UpToDate { node_id: String },
    Skipped { reason: String },
}

/// Work produced off the writer task: parse + extract + embed, no I/O on
/// the artifact store.
pub(crate) enum Prepared {
    Ready(Box<PreparedDocument>),
    UpToDate { node_id: String },
    Skipped { reason: String, silent: bool },
}

pub(crate) struct PreparedDocument {
    pub document: Document,
    pub node: GraphNode,
    pub edges: Vec<GraphEdge>,
    pub embeddings: Vec<Embedding>,
    pub degraded: bool,
    pub warnings: Vec<String>,
    pub previous_hash: Option<String>,
    pub started: Instant,
}

/// Parse, route, extract, and (at L2+) chunk and embed one file.
pub(crate) fn prepare_document(
    relative_path: &str,
    bytes: &[u8],
    deps: &IndexerDeps<'_>,
    force: bool,
) -> Result<Prepared> {
    let started = Instant::now();

    let outcome = match parse_document(relative_path, bytes) {
        ParseOutcome::NoFrontMatter => {
            return Ok(Prepared::Skipped {
                reason: "no front-matter".into(),
                silent: true,
            });
        }
        ParseOutcome::UnknownKind { value, source_hash } => {
            deps.publish(Event::DocumentDetected {
                source_path: relative_path.to_string(),
                source_hash,
                detected_at: Utc::now(),
            });
            log::warn!("{relative_path}: unknown kind '{value}', document ignored");
            return Ok(Prepared::Skipped {
                reason: format!("UNKNOWN_KIND: {value}"),
                silent: false,
            });
        }
        ParseOutcome::Parsed { document, warning } => (document, warning),
    };
    let (mut document, route_warning) = outcome;

    if let Some(domain) = &deps.domain {
        document.domain = Some(domain.clone());
    }

    deps.publish(Event::DocumentDetected {
        source_path: relative_path.to_string(),
        source_hash: document.source_hash.clone(),
        detected_at: Utc::now(),
    });

    let existing = deps.store.read_node_by_document_id(&document.id)?;
    let previous_hash = existing.as_ref().map(|n| n.source_hash.clone());
    if let Some(prev) = &existing {
        if prev.source_hash == document.source_hash && !force {
            return Ok(Prepared::UpToDate {
                node_id: prev.id.clone(),
            });
        }
    }

    let mut warnings = Vec::new();
    if let Some(warning) = route_warning {
        log::warn!("{warning}");
        warnings.push(warning);
    }

    let (node, edges) = kdd_extract::extract(&document);

    let mut embeddings = Vec::new();
    let mut degraded = false;
    if deps.index_level >= IndexLevel::L2 {
        if let Some(embedder) = deps.embedder {
            let existing_embeddings = deps.store.read_embeddings(&document.id)?;
            match embed_document(
                &document,
                embedder,
                embedder.dimensions(),
                &existing_embeddings,
            ) {
                EmbedOutcome::Embedded(generated) => embeddings = generated,
                EmbedOutcome::Degraded { warning } => {
                    log::warn!("{}: {warning}, degrading to L1", document.source_path);
                    warnings.push(warning);
                    degraded = true;
                }
            }
        }
    }

    Ok(Prepared::Ready(Box::new(PreparedDocument {
        document,
        node,
        edges,
        embeddings,
        degraded,
        warnings,
        previous_hash,
        started,
    })))
}

/// Persist a prepared document and emit the lifecycle events. Runs on the
/// single writer task.
pub(crate) fn persist_document(
    prepared: PreparedDocument,
    deps: &IndexerDeps<'_>,
) -> Result<DocumentOutcome> {
    let PreparedDocument {
        document,
        node,
        edges,
        embeddings,
        degraded,
        warnings,
        previous_hash,
        started,
    } = prepared;

    if let Some(previous_hash) = previous_hash {
        deps.publish(Event::DocumentStale {
            document_id: document.id.clone(),
            source_path: document.source_path.clone(),
            previous_hash,
            current_hash: document.source_hash.clone(),
            detected_at: Utc::now(),
        });
        deps.store.delete_document(&document.id)?;
    }

    deps.store.write_node(&node)?;
    if !edges.is_empty() {
        deps.store.append_edges(&edges)?;
    }
    if !embeddings.is_empty() {
        deps.store.write_embeddings(&embeddings)?;
    }
    // Re-indexing a document supersedes any earlier deletion.
    deps.store.clear_tombstone(&node.id)?;

    deps.publish(Event::DocumentParsed {
        document_id: document.id.clone(),
        source_path: document.source_path.clone(),
        kind: document.kind,
        section_count: document.sections.len(),
        wiki_link_count: document.wiki_links.len(),
        parsed_at: Utc::now(),
    });

    let effective_level = if degraded {
        IndexLevel::L1
    } else {
        deps.index_level
    };
    deps.publish(Event::DocumentIndexed {
        document_id: document.id.clone(),
        source_path: document.source_path.clone(),
        kind: document.kind,
        node_id: node.id.clone(),
        edge_count: edges.len(),
        embedding_count: embeddings.len(),
        index_level: effective_level,
        duration_ms: started.elapsed().as_millis() as u64,
        indexed_at: Utc::now(),
    });

    Ok(DocumentOutcome::Indexed {
        node_id: node.id,
        edge_count: edges.len(),
        embedding_count: embeddings.len(),
        degraded,
        warnings,
    })
}

/// Index a single spec file at `file_path`.
///
/// `specs_root` anchors the repo-relative path recorded in artifacts. With
/// `force` unset, an unchanged content hash is a no-op.
pub async fn index_document(
    file_path: &Path,
    specs_root: &Path,
    deps: &IndexerDeps<'_>,
    force: bool,
) -> Result<DocumentOutcome> {
    let bytes = tokio::fs::read(file_path).await?;
    let relative = relative_path(file_path, specs_root);

    match prepare_document(&relative, &bytes, deps, force)? {
        Prepared::Skipped { reason, .. } => Ok(DocumentOutcome::Skipped { reason }),
        Prepared::UpToDate { node_id } => Ok(DocumentOutcome::UpToDate { node_id }),
        Prepared::Ready(prepared) => persist_document(*prepared, deps),
    }
}

pub(crate) fn relative_path(file_path: &Path, specs_root: &Path) -> String {
    let base = specs_root.parent().unwrap_or(specs_root);
    file_path
        .strip_prefix(base)
        .unwrap_or(file_path)
        .to_string_lossy()
        .replace('\\', "/")
}

//! Domain lifecycle events.
//!
//! Events are immutable payloads published through the [`crate::EventBus`].
//! Consumers receive them wrapped in a [`crate::SequencedEvent`] carrying a
//! monotonically increasing sequence number.

use crate::enums::{IndexLevel, Kind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every event the engine can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    /// A spec file with front-matter was found.
    DocumentDetected {
        source_path: String,
        source_hash: String,
        detected_at: DateTime<Utc>,
    },
    /// A document was parsed and routed to its extractor.
    DocumentParsed {
        document_id: String,
        source_path: String,
        kind: Kind,
        section_count: usize,
        wiki_link_count: usize,
        parsed_at: DateTime<Utc>,
    },
    /// A document completed the full indexing pipeline.
    DocumentIndexed {
        document_id: String,
        source_path: String,
        kind: Kind,
        node_id: String,
        edge_count: usize,
        embedding_count: usize,
        index_level: IndexLevel,
        duration_ms: u64,
        indexed_at: DateTime<Utc>,
    },
    /// A previously indexed document was modified on disk.
    DocumentStale {
        document_id: String,
        source_path: String,
        previous_hash: String,
        current_hash: String,
        detected_at: DateTime<Utc>,
    },
    /// A previously indexed document was removed from the filesystem.
    DocumentDeleted {
        document_id: String,
        source_path: String,
        node_id: String,
        deleted_at: DateTime<Utc>,
    },
    /// A merge of multiple indexes was requested.
    MergeRequested {
        source_count: usize,
        requested_at: DateTime<Utc>,
    },
    /// A merge completed successfully.
    MergeCompleted {
        source_count: usize,
        total_nodes: usize,
        total_edges: usize,
        total_embeddings: usize,
        conflicts_resolved: usize,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    },
    /// A retrieval query arrived.
    QueryReceived {
        query_id: String,
        strategy: String,
        received_at: DateTime<Utc>,
    },
    /// A retrieval query resolved successfully.
    QueryCompleted {
        query_id: String,
        strategy: String,
        total_results: usize,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    },
    /// A retrieval query failed during validation or resolution.
    QueryFailed {
        query_id: String,
        strategy: String,
        error_code: String,
        error_message: String,
        duration_ms: u64,
        failed_at: DateTime<Utc>,
    },
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::DocumentDetected { .. } => "document-detected",
            Event::DocumentParsed { .. } => "document-parsed",
            Event::DocumentIndexed { .. } => "document-indexed",
            Event::DocumentStale { .. } => "document-stale",
            Event::DocumentDeleted { .. } => "document-deleted",
            Event::MergeRequested { .. } => "merge-requested",
            Event::MergeCompleted { .. } => "merge-completed",
            Event::QueryReceived { .. } => "query-received",
            Event::QueryCompleted { .. } => "query-completed",
            Event::QueryFailed { .. } => "query-failed",
        }
    }
}

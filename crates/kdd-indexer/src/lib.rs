//! # KDD Indexer
//!
//! The write side of the engine:
//!
//! - [`index_document`] — the single-file pipeline (detect → parse → route
//!   → extract → layer-classify → chunk + embed → persist → events);
//! - [`index_incremental`] — walks a version-control diff and dispatches
//!   add/update/delete with cascade semantics, falling back to a full scan;
//! - [`merge_indexes`] — reconciles artifact roots from multiple producers
//!   (last-write-wins, delete-wins via tombstones).
//!
//! Files fan out to bounded worker tasks; all artifact writes stay on the
//! driver task so `edges.jsonl` and the manifest have a single writer.

mod error;
mod git;
mod incremental;
mod indexer;
mod merge;
mod stats;

pub use error::{IndexerError, Result};
pub use git::GitAdapter;
pub use incremental::{index_incremental, DiffEntry, DiffStatus, IncrementalOptions, VcsDiff};
pub use indexer::{index_document, DocumentOutcome, IndexerDeps};
pub use merge::{merge_indexes, MergeError, MergeOptions, MergeReport};
pub use stats::IngestReport;

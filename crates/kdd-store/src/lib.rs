//! # KDD Store
//!
//! The durable artifact layout under `.kdd-index/`:
//!
//! ```text
//! manifest.json
//! nodes/<kind>/<DocumentId>.json
//! edges/edges.jsonl
//! embeddings/<kind>/<DocumentId>.json
//! deletions.jsonl
//! .lock
//! ```
//!
//! Every write goes through a staging file and an atomic rename, and every
//! file is canonical JSON, so two producers indexing the same inputs emit
//! byte-identical artifacts.

mod artifact;
mod canonical;
mod error;
mod loader;
mod lock;

pub use artifact::{ArtifactStore, DeletedArtifacts, Tombstone};
pub use canonical::{round_vector, to_canonical_json, to_canonical_line};
pub use error::{Result, StoreError};
pub use loader::{load_index, LoadedIndex};
pub use lock::IndexLock;

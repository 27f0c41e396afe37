//! # KDD Graph
//!
//! The in-memory knowledge graph loaded from artifacts: a petgraph-backed
//! directed labeled multigraph keyed by stable string node ids, plus the
//! indices the query engine needs — by-kind, a lexical inverted index, and
//! the orphan-edge list.
//!
//! ```text
//! GraphNode[] + GraphEdge[]
//!     │
//!     ├──> DiGraph (adjacency, edge weights = GraphEdge)
//!     ├──> by-kind index
//!     ├──> lexical index (token → node ids)
//!     └──> orphan edges (an endpoint is not in the index)
//! ```
//!
//! The store is immutable after `load`; incremental builds swap in a whole
//! new snapshot.

mod store;

pub use store::{GraphStore, OrphanEdge, OrphanReason, ReversePath, Traversal};

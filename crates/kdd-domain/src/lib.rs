//! # KDD Domain
//!
//! Core data model for the KDD knowledge-retrieval engine.
//!
//! ## Architecture
//!
//! ```text
//! spec files (Markdown)
//!     │
//!     ├──> Document (ephemeral, per-ingestion)
//!     │
//!     ├──> GraphNode + GraphEdge[] + Embedding[]  (persistent artifacts)
//!     │
//!     └──> IndexManifest (one per .kdd-index/)
//! ```
//!
//! Everything here is deterministic and free of I/O: the enums and entities
//! shared by every crate, the pure business rules (kind routing, layer
//! validation, embeddable sections, merge conflict resolution), the domain
//! event types, and the synchronous event bus.

mod bus;
mod entities;
mod enums;
mod error;
mod events;
mod ports;
mod rules;

pub use bus::{EventBus, EventConsumer, SequencedEvent};
pub use entities::{
    Document, Embedding, GraphEdge, GraphNode, IndexManifest, IndexStats, LayerViolation,
    ScoredNode, Section, WikiLinkRef,
};
pub use enums::{EdgeType, ExtractionMethod, IndexLevel, Kind, Layer, MergeStrategy, Structure};
pub use error::{DomainError, Result};
pub use events::Event;
pub use ports::EmbeddingModel;
pub use rules::{
    detect_index_level, edge_type_name, embeddable_sections, expected_path, is_layer_violation,
    is_structural_edge, kind_priority, layer_of_path, resolve_node_conflict, route_document,
    ConflictWinner, RouteOutcome,
};

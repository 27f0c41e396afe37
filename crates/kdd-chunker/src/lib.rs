//! # KDD Chunker
//!
//! Hierarchical chunking of a document's embeddable sections and embedding
//! generation through the abstract [`kdd_domain::EmbeddingModel`].
//!
//! A chunk is a paragraph enriched with its ancestry: an identity line,
//! the first sentence of each ancestor section, and the raw text. The hash
//! of that context text decides whether an existing embedding can be
//! reused.

mod chunk;
mod embed;

pub use chunk::{chunk_document, Chunk};
pub use embed::{embed_document, EmbedOutcome};

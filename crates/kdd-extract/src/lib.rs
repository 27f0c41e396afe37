//! # KDD Extract
//!
//! One extractor per artifact kind. Each consumes a parsed
//! [`kdd_domain::Document`] and produces the graph node plus its typed,
//! directed edges. Dispatch is a match on the closed [`kdd_domain::Kind`]
//! set; the shared helpers in [`base`] keep the extractors small.

mod base;
mod kinds;
mod registry;

pub use base::{guess_layer_of_node_id, resolve_link_target};
pub use registry::extract;

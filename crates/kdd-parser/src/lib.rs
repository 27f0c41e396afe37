//! # KDD Parser
//!
//! Turns a spec file's raw bytes into a [`kdd_domain::Document`]: BOM
//! stripping, YAML front-matter, an ATX section tree with hierarchical
//! paths, wiki-link extraction, and the SHA-256 content hash.

mod document;
mod frontmatter;
mod hashing;
mod markdown;
mod tokenize;
mod wiki_links;

pub use document::{parse_document, ParseOutcome};
pub use frontmatter::extract_front_matter;
pub use hashing::content_hash;
pub use markdown::{extract_snippet, heading_to_anchor, parse_sections, parse_table_rows};
pub use tokenize::{estimate_tokens, truncate_to_tokens};
pub use wiki_links::{extract_wiki_links, WikiLink};

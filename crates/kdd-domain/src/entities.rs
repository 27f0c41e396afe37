use crate::enums::{EdgeType, ExtractionMethod, IndexLevel, Kind, Layer, Structure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Markdown section extracted from a spec document.
///
/// `path` is the dot-separated heading ancestry, e.g. `descripcion.atributos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub level: u8,
    pub content: String,
    pub path: String,
}

impl Section {
    /// True when the section body is nothing but fenced code or a mermaid
    /// block; such sections never produce chunks.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        let trimmed = self.content.trim();
        !trimmed.is_empty() && trimmed.starts_with("```") && trimmed.ends_with("```")
    }
}

/// A wiki-link occurrence, with its originating section path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiLinkRef {
    pub target: String,
    pub section_path: String,
}

/// A parsed spec file — the atomic input to the indexing pipeline.
///
/// Ephemeral: created by the parser, consumed by the extractors and the
/// chunker, never persisted.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub kind: Kind,
    pub source_path: String,
    pub source_hash: String,
    pub layer: Layer,
    pub front_matter: BTreeMap<String, serde_json::Value>,
    pub sections: Vec<Section>,
    pub wiki_links: Vec<WikiLinkRef>,
    pub domain: Option<String>,
}

impl Document {
    /// Front-matter `status`, defaulting to `draft`.
    #[must_use]
    pub fn status(&self) -> String {
        self.front_matter
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("draft")
            .to_string()
    }

    /// Front-matter `aliases` as a string list.
    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        self.front_matter
            .get("aliases")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A node in the knowledge graph, produced by indexing one document.
///
/// Identity: `id = "{Kind}:{DocumentId}"`, globally unique within a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: Kind,
    pub source_file: String,
    pub source_hash: String,
    pub layer: Layer,
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub indexed_fields: BTreeMap<String, serde_json::Value>,
    pub indexed_at: DateTime<Utc>,
}

impl GraphNode {
    /// The unqualified document id (the part after the kind prefix).
    #[must_use]
    pub fn document_id(&self) -> &str {
        self.id.split_once(':').map_or(self.id.as_str(), |(_, d)| d)
    }
}

/// A typed, directed relationship between two graph nodes.
///
/// Uniqueness key: `(from_node, to_node, edge_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from_node: String,
    pub to_node: String,
    pub edge_type: String,
    pub source_file: String,
    pub extraction_method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub layer_violation: bool,
    #[serde(default)]
    pub bidirectional: bool,
}

impl GraphEdge {
    /// The deduplication key for the edge set.
    #[must_use]
    pub fn key(&self) -> (String, String, String) {
        (
            self.from_node.clone(),
            self.to_node.clone(),
            self.edge_type.clone(),
        )
    }

    #[must_use]
    pub fn is_type(&self, edge_type: EdgeType) -> bool {
        self.edge_type == edge_type.as_str()
    }
}

/// A semantic vector generated from one chunk of a document.
///
/// Identity: `{document_id}:{section_path}:{chunk_index}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub id: String,
    pub document_id: String,
    pub document_kind: Kind,
    pub section_path: String,
    pub chunk_index: u32,
    pub raw_text: String,
    pub context_text: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
    pub text_hash: String,
    pub generated_at: DateTime<Utc>,
}

impl Embedding {
    #[must_use]
    pub fn make_id(document_id: &str, section_path: &str, chunk_index: u32) -> String {
        format!("{document_id}:{section_path}:{chunk_index}")
    }
}

/// Aggregate counts stored in the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub nodes: usize,
    pub edges: usize,
    pub embeddings: usize,
    pub enrichments: usize,
}

/// Metadata for a generated index, stored in `.kdd-index/manifest.json`.
///
/// The embedding fields are present iff the index level is at least L2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub version: String,
    pub kdd_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dimensions: Option<usize>,
    pub indexed_at: DateTime<Utc>,
    pub indexed_by: String,
    pub structure: Structure,
    pub index_level: IndexLevel,
    pub stats: IndexStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
}

impl IndexManifest {
    /// Semver major component, used for merge compatibility.
    #[must_use]
    pub fn major_version(&self) -> &str {
        self.version.split('.').next().unwrap_or(&self.version)
    }
}

/// A graph node scored by the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node_id: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub match_source: String,
}

/// A detected layer-dependency violation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerViolation {
    pub from_node: String,
    pub to_node: String,
    pub from_layer: Layer,
    pub to_layer: Layer,
    pub edge_type: String,
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub explanation: String,
}

//! Immutable query snapshot assembled from a loaded artifact root.

use crate::error::{QueryError, Result};
use kdd_domain::{Embedding, GraphNode, IndexLevel, IndexManifest, Kind};
use kdd_graph::GraphStore;
use kdd_store::LoadedIndex;
use kdd_vector::VectorStore;
use std::collections::HashMap;

/// Everything the queries read: the graph, the optional vector index, and
/// the embedding payloads for hydration. Read-only after construction; an
/// incremental build swaps in a whole new snapshot.
pub struct Snapshot {
    pub manifest: IndexManifest,
    pub graph: GraphStore,
    pub vectors: Option<VectorStore>,
    embeddings_by_id: HashMap<String, Embedding>,
}

impl Snapshot {
    /// Assemble graph + vector stores from a strict load.
    pub fn from_loaded(loaded: LoadedIndex) -> Result<Self> {
        let LoadedIndex {
            manifest,
            nodes,
            edges,
            embeddings,
            ..
        } = loaded;

        let graph = GraphStore::load(nodes, edges);

        let vectors = match (manifest.index_level >= IndexLevel::L2, manifest.embedding_dimensions)
        {
            (true, Some(dimensions)) if !embeddings.is_empty() => Some(
                VectorStore::build(dimensions, &embeddings)
                    .map_err(|e| QueryError::IndexUnavailable(e.to_string()))?,
            ),
            _ => None,
        };

        let embeddings_by_id = embeddings
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        Ok(Self {
            manifest,
            graph,
            vectors,
            embeddings_by_id,
        })
    }

    #[must_use]
    pub fn embedding(&self, id: &str) -> Option<&Embedding> {
        self.embeddings_by_id.get(id)
    }

    /// Resolve an embedding's owner to its graph node.
    #[must_use]
    pub fn node_for_embedding(&self, document_id: &str, kind: Kind) -> Option<&GraphNode> {
        self.graph.get_node(&kind.node_id(document_id))
    }

    #[must_use]
    pub fn supports_semantic(&self) -> bool {
        self.vectors.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use kdd_domain::{
        ExtractionMethod, GraphEdge, IndexStats, Layer, Structure,
    };
    use std::collections::BTreeMap;

    pub(crate) fn test_manifest(level: IndexLevel, dimensions: Option<usize>) -> IndexManifest {
        IndexManifest {
            version: "1.0.0".into(),
            kdd_version: "1.0.0".into(),
            embedding_model: dimensions.map(|_| "test-model".to_string()),
            embedding_dimensions: dimensions,
            indexed_at: Utc::now(),
            indexed_by: "test".into(),
            structure: Structure::SingleDomain,
            index_level: level,
            stats: IndexStats::default(),
            domains: vec![],
            git_commit: None,
        }
    }

    pub(crate) fn test_node(id: &str, kind: Kind, layer: Layer) -> GraphNode {
        let mut fields = BTreeMap::new();
        let document_id = id.split_once(':').map_or(id, |(_, d)| d);
        fields.insert(
            "description".to_string(),
            serde_json::Value::String(format!("descripción de {document_id}")),
        );
        GraphNode {
            id: id.into(),
            kind,
            source_file: format!("specs/{}/{document_id}.md", layer),
            source_hash: "h".into(),
            layer,
            status: "draft".into(),
            aliases: vec![],
            domain: None,
            indexed_fields: fields,
            indexed_at: Utc::now(),
        }
    }

    pub(crate) fn test_edge(
        from: &str,
        to: &str,
        edge_type: &str,
        violation: bool,
    ) -> GraphEdge {
        GraphEdge {
            from_node: from.into(),
            to_node: to.into(),
            edge_type: edge_type.into(),
            source_file: "specs/test.md".into(),
            extraction_method: ExtractionMethod::WikiLink,
            metadata: BTreeMap::new(),
            layer_violation: violation,
            bidirectional: false,
        }
    }

    /// L1 snapshot from inline node/edge tuples.
    pub(crate) fn snapshot_with(
        nodes: &[(&str, Kind, Layer)],
        edges: &[(&str, &str, &str, bool)],
    ) -> Snapshot {
        let nodes: Vec<GraphNode> = nodes
            .iter()
            .map(|(id, kind, layer)| test_node(id, *kind, *layer))
            .collect();
        let edges: Vec<GraphEdge> = edges
            .iter()
            .map(|(f, t, ty, v)| test_edge(f, t, ty, *v))
            .collect();
        Snapshot {
            manifest: test_manifest(IndexLevel::L1, None),
            graph: GraphStore::load(nodes, edges),
            vectors: None,
            embeddings_by_id: HashMap::new(),
        }
    }

    /// L2 snapshot with a vector index over the given embeddings.
    pub(crate) fn snapshot_with_vectors(
        nodes: &[(&str, Kind, Layer)],
        edges: &[(&str, &str, &str, bool)],
        embeddings: Vec<Embedding>,
        dimensions: usize,
    ) -> Snapshot {
        let mut snapshot = snapshot_with(nodes, edges);
        snapshot.manifest = test_manifest(IndexLevel::L2, Some(dimensions));
        snapshot.vectors = Some(VectorStore::build(dimensions, &embeddings).unwrap());
        snapshot.embeddings_by_id = embeddings.into_iter().map(|e| (e.id.clone(), e)).collect();
        snapshot
    }
}

//! Startup loader.
//!
//! Reads the manifest, every node file, the edge log, and all embeddings.
//! Any parse error aborts the load with the offending path — a partial
//! load is never handed to the query engine.

use crate::artifact::{ArtifactStore, Tombstone};
use crate::error::{Result, StoreError};
use kdd_domain::{Embedding, GraphEdge, GraphNode, IndexManifest};

/// Everything a query snapshot needs, read strictly from one artifact root.
#[derive(Debug)]
pub struct LoadedIndex {
    pub manifest: IndexManifest,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub embeddings: Vec<Embedding>,
    pub tombstones: Vec<Tombstone>,
}

/// Load an artifact root in full.
pub fn load_index(store: &ArtifactStore) -> Result<LoadedIndex> {
    let manifest = store.read_manifest()?.ok_or_else(|| {
        StoreError::invalid(store.root().join("manifest.json"), "manifest not found")
    })?;

    let nodes = store.read_all_nodes()?;
    let edges = store.read_edges()?;
    let embeddings = store.read_all_embeddings()?;
    let tombstones = store.read_tombstones()?;

    log::info!(
        "loaded index from {}: {} nodes, {} edges, {} embeddings",
        store.root().display(),
        nodes.len(),
        edges.len(),
        embeddings.len()
    );

    Ok(LoadedIndex {
        manifest,
        nodes,
        edges,
        embeddings,
        tombstones,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kdd_domain::{IndexLevel, IndexStats, Kind, Layer, Structure};
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn manifest() -> IndexManifest {
        IndexManifest {
            version: "1.0.0".into(),
            kdd_version: "1.0.0".into(),
            embedding_model: None,
            embedding_dimensions: None,
            indexed_at: Utc::now(),
            indexed_by: "test".into(),
            structure: Structure::SingleDomain,
            index_level: IndexLevel::L1,
            stats: IndexStats::default(),
            domains: vec![],
            git_commit: None,
        }
    }

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: format!("Entity:{id}"),
            kind: Kind::Entity,
            source_file: format!("specs/01-domain/entities/{id}.md"),
            source_hash: "h".into(),
            layer: Layer::Domain,
            status: "draft".into(),
            aliases: vec![],
            domain: None,
            indexed_fields: BTreeMap::new(),
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn loads_written_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_manifest(&manifest()).unwrap();
        store.write_node(&node("Pedido")).unwrap();
        store.write_node(&node("Usuario")).unwrap();

        let loaded = load_index(&store).unwrap();
        assert_eq!(loaded.nodes.len(), 2);
        assert!(loaded.edges.is_empty());
    }

    #[test]
    fn missing_manifest_fails() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(load_index(&store).is_err());
    }

    #[test]
    fn corrupt_node_aborts_with_path() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_manifest(&manifest()).unwrap();

        let bad = dir.path().join("nodes").join("entity");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join("Broken.json"), "{not json").unwrap();

        let err = load_index(&store).unwrap_err();
        assert!(err.to_string().contains("Broken.json"));
    }
}

//! Filesystem artifact store for `.kdd-index/`.
//!
//! Single-writer: the caller holds the advisory [`crate::IndexLock`] for
//! the duration of any mutation. All writes go through a staging file and
//! an atomic rename.

use crate::canonical::{round_vector, to_canonical_json, to_canonical_line};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use kdd_domain::{Embedding, GraphEdge, GraphNode, IndexManifest, Kind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// An explicit deletion marker, required for merge delete-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    pub node_id: String,
    pub deleted_at: DateTime<Utc>,
}

/// What a cascade delete removed.
#[derive(Debug, Clone, Default)]
pub struct DeletedArtifacts {
    pub node_id: Option<String>,
    pub edges_removed: usize,
    pub embeddings_removed: usize,
}

/// Read/write access to one `.kdd-index/` directory.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.manifest_path().exists()
    }

    // ------------------------------------------------------------------
    // Manifest
    // ------------------------------------------------------------------

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn write_manifest(&self, manifest: &IndexManifest) -> Result<()> {
        self.atomic_write(&self.manifest_path(), &to_canonical_json(manifest)?)
    }

    pub fn read_manifest(&self) -> Result<Option<IndexManifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let manifest = serde_json::from_str(&text)
            .map_err(|e| StoreError::invalid(&path, e.to_string()))?;
        Ok(Some(manifest))
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    fn node_path(&self, kind: Kind, document_id: &str) -> PathBuf {
        self.root
            .join("nodes")
            .join(kind.as_str())
            .join(format!("{document_id}.json"))
    }

    pub fn write_node(&self, node: &GraphNode) -> Result<()> {
        let path = self.node_path(node.kind, node.document_id());
        self.atomic_write(&path, &to_canonical_json(node)?)
    }

    /// Find a node file by unqualified document id, searching all kind
    /// directories (the directory supplies the kind).
    pub fn read_node_by_document_id(&self, document_id: &str) -> Result<Option<GraphNode>> {
        for kind in Kind::ALL {
            let path = self.node_path(kind, document_id);
            if path.exists() {
                let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
                let node = serde_json::from_str(&text)
                    .map_err(|e| StoreError::invalid(&path, e.to_string()))?;
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Every node in the store, in sorted directory order.
    pub fn read_all_nodes(&self) -> Result<Vec<GraphNode>> {
        let mut nodes = Vec::new();
        let nodes_dir = self.root.join("nodes");
        if !nodes_dir.exists() {
            return Ok(nodes);
        }
        for kind in Kind::ALL {
            let kind_dir = nodes_dir.join(kind.as_str());
            if !kind_dir.exists() {
                continue;
            }
            for path in sorted_json_files(&kind_dir)? {
                let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
                let node: GraphNode = serde_json::from_str(&text)
                    .map_err(|e| StoreError::invalid(&path, e.to_string()))?;
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    fn edges_path(&self) -> PathBuf {
        self.root.join("edges").join("edges.jsonl")
    }

    /// Append edges, suppressing duplicates by `(from, to, type)`. The file
    /// is rewritten through staging, which also compacts any duplicates
    /// already present. Returns how many new edges were written.
    pub fn append_edges(&self, edges: &[GraphEdge]) -> Result<usize> {
        let existing = self.read_edges()?;
        let mut seen: BTreeSet<(String, String, String)> =
            existing.iter().map(GraphEdge::key).collect();

        let mut all = existing;
        let mut added = 0;
        for edge in edges {
            if seen.insert(edge.key()) {
                all.push(edge.clone());
                added += 1;
            }
        }
        if added > 0 {
            self.rewrite_edges(&all)?;
        }
        Ok(added)
    }

    pub fn read_edges(&self) -> Result<Vec<GraphEdge>> {
        let path = self.edges_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let mut edges = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let edge: GraphEdge = serde_json::from_str(line).map_err(|e| {
                StoreError::invalid(&path, format!("line {}: {e}", lineno + 1))
            })?;
            edges.push(edge);
        }
        Ok(edges)
    }

    fn rewrite_edges(&self, edges: &[GraphEdge]) -> Result<()> {
        let mut out = String::new();
        for edge in edges {
            out.push_str(&to_canonical_line(edge)?);
        }
        self.atomic_write(&self.edges_path(), &out)
    }

    // ------------------------------------------------------------------
    // Embeddings
    // ------------------------------------------------------------------

    fn embedding_path(&self, kind: Kind, document_id: &str) -> PathBuf {
        self.root
            .join("embeddings")
            .join(kind.as_str())
            .join(format!("{document_id}.json"))
    }

    /// One file per document holding its embedding array. Vectors are
    /// rounded to the canonical precision before writing.
    pub fn write_embeddings(&self, embeddings: &[Embedding]) -> Result<()> {
        if embeddings.is_empty() {
            return Ok(());
        }
        let mut rounded: Vec<Embedding> = embeddings.to_vec();
        for emb in &mut rounded {
            round_vector(&mut emb.vector);
        }
        let kind = rounded[0].document_kind;
        let document_id = rounded[0].document_id.clone();
        let path = self.embedding_path(kind, &document_id);
        self.atomic_write(&path, &to_canonical_json(&rounded)?)
    }

    pub fn read_embeddings(&self, document_id: &str) -> Result<Vec<Embedding>> {
        for kind in Kind::ALL {
            let path = self.embedding_path(kind, document_id);
            if path.exists() {
                let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
                return serde_json::from_str(&text)
                    .map_err(|e| StoreError::invalid(&path, e.to_string()));
            }
        }
        Ok(Vec::new())
    }

    pub fn read_all_embeddings(&self) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::new();
        let dir = self.root.join("embeddings");
        if !dir.exists() {
            return Ok(embeddings);
        }
        for kind in Kind::ALL {
            let kind_dir = dir.join(kind.as_str());
            if !kind_dir.exists() {
                continue;
            }
            for path in sorted_json_files(&kind_dir)? {
                let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
                let mut batch: Vec<Embedding> = serde_json::from_str(&text)
                    .map_err(|e| StoreError::invalid(&path, e.to_string()))?;
                embeddings.append(&mut batch);
            }
        }
        Ok(embeddings)
    }

    // ------------------------------------------------------------------
    // Tombstones
    // ------------------------------------------------------------------

    fn deletions_path(&self) -> PathBuf {
        self.root.join("deletions.jsonl")
    }

    pub fn append_tombstone(&self, tombstone: &Tombstone) -> Result<()> {
        let mut all = self.read_tombstones()?;
        if all.iter().any(|t| t.node_id == tombstone.node_id) {
            return Ok(());
        }
        all.push(tombstone.clone());
        let mut out = String::new();
        for t in &all {
            out.push_str(&to_canonical_line(t)?);
        }
        self.atomic_write(&self.deletions_path(), &out)
    }

    pub fn read_tombstones(&self) -> Result<Vec<Tombstone>> {
        let path = self.deletions_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let mut tombstones = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let t: Tombstone = serde_json::from_str(line).map_err(|e| {
                StoreError::invalid(&path, format!("line {}: {e}", lineno + 1))
            })?;
            tombstones.push(t);
        }
        Ok(tombstones)
    }

    /// Drop a node id from the tombstone file, when the document was
    /// re-indexed after a deletion.
    pub fn clear_tombstone(&self, node_id: &str) -> Result<()> {
        let all = self.read_tombstones()?;
        if !all.iter().any(|t| t.node_id == node_id) {
            return Ok(());
        }
        let mut out = String::new();
        for t in all.iter().filter(|t| t.node_id != node_id) {
            out.push_str(&to_canonical_line(t)?);
        }
        self.atomic_write(&self.deletions_path(), &out)
    }

    // ------------------------------------------------------------------
    // Cascade delete
    // ------------------------------------------------------------------

    /// Remove a document's node, its embeddings, and every edge touching
    /// its node id; record a tombstone. Returns what was removed.
    pub fn delete_document(&self, document_id: &str) -> Result<DeletedArtifacts> {
        let mut deleted = DeletedArtifacts::default();

        for kind in Kind::ALL {
            let path = self.node_path(kind, document_id);
            if !path.exists() {
                continue;
            }
            let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            let node: GraphNode = serde_json::from_str(&text)
                .map_err(|e| StoreError::invalid(&path, e.to_string()))?;
            fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            remove_dir_if_empty(path.parent());
            deleted.node_id = Some(node.id.clone());

            let edges = self.read_edges()?;
            let before = edges.len();
            let kept: Vec<GraphEdge> = edges
                .into_iter()
                .filter(|e| e.from_node != node.id && e.to_node != node.id)
                .collect();
            let removed_edges = before - kept.len();
            if removed_edges > 0 {
                self.rewrite_edges(&kept)?;
                deleted.edges_removed = removed_edges;
            }

            self.append_tombstone(&Tombstone {
                node_id: node.id,
                deleted_at: Utc::now(),
            })?;
            break;
        }

        for kind in Kind::ALL {
            let path = self.embedding_path(kind, document_id);
            if path.exists() {
                let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
                let batch: Vec<Embedding> = serde_json::from_str(&text)
                    .map_err(|e| StoreError::invalid(&path, e.to_string()))?;
                deleted.embeddings_removed = batch.len();
                fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
                remove_dir_if_empty(path.parent());
                break;
            }
        }

        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn atomic_write(&self, path: &Path, content: &str) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::invalid(path, "path has no parent"))?;
        fs::create_dir_all(parent).map_err(|e| StoreError::write(parent, e))?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content).map_err(|e| StoreError::write(&staging, e))?;
        fs::rename(&staging, path).map_err(|e| StoreError::write(path, e))?;
        Ok(())
    }
}

fn sorted_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| StoreError::io(dir, e))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn remove_dir_if_empty(dir: Option<&Path>) {
    if let Some(dir) = dir {
        let is_empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            let _ = fs::remove_dir(dir);
        }
    }
}

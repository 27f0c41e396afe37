use crate::similarity::{cosine_similarity, normalize};
use kdd_domain::{Embedding, Kind};
use std::collections::{BinaryHeap, HashMap, HashSet};
use thiserror::Error;

/// Max links kept per vector in the neighbor graph.
const M: usize = 16;
/// Beam width during search.
const EF_SEARCH: usize = 50;
/// Candidate pool considered when linking a new vector.
const EF_CONSTRUCTION: usize = 200;
/// Below this size an exact scan beats the graph walk.
const EXACT_THRESHOLD: usize = 256;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A search hit: embedding id plus a similarity score clamped to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub embedding_id: String,
    pub document_id: String,
    pub document_kind: Kind,
    pub score: f32,
}

struct Entry {
    id: String,
    document_id: String,
    document_kind: Kind,
    vector: Vec<f32>,
}

/// ANN index over normalized embedding vectors.
///
/// Slots are tombstoned on removal so neighbor lists stay valid; the graph
/// degrades gracefully and small indexes always use the exact path.
pub struct VectorStore {
    dimensions: usize,
    entries: Vec<Option<Entry>>,
    neighbors: Vec<Vec<usize>>,
    by_id: HashMap<String, usize>,
    entry_point: Option<usize>,
    live: usize,
}

impl VectorStore {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
            neighbors: Vec::new(),
            by_id: HashMap::new(),
            entry_point: None,
            live: 0,
        }
    }

    /// One-shot build from loaded embeddings.
    pub fn build(
        dimensions: usize,
        embeddings: &[Embedding],
    ) -> Result<Self, VectorStoreError> {
        let mut store = Self::new(dimensions);
        for embedding in embeddings {
            store.add(embedding)?;
        }
        log::debug!("vector index built: {} vectors", store.len());
        Ok(store)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn add(&mut self, embedding: &Embedding) -> Result<(), VectorStoreError> {
        if embedding.vector.len() != self.dimensions {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.vector.len(),
            });
        }
        if let Some(&slot) = self.by_id.get(&embedding.id) {
            // Replace in place; links stay as they were.
            let mut vector = embedding.vector.clone();
            normalize(&mut vector);
            self.entries[slot] = Some(Entry {
                id: embedding.id.clone(),
                document_id: embedding.document_id.clone(),
                document_kind: embedding.document_kind,
                vector,
            });
            return Ok(());
        }

        let mut vector = embedding.vector.clone();
        normalize(&mut vector);

        let slot = self.entries.len();
        let links = self.nearest_slots(&vector, M, EF_CONSTRUCTION);

        self.entries.push(Some(Entry {
            id: embedding.id.clone(),
            document_id: embedding.document_id.clone(),
            document_kind: embedding.document_kind,
            vector,
        }));
        self.neighbors.push(links.clone());
        self.by_id.insert(embedding.id.clone(), slot);
        self.live += 1;

        for link in links {
            self.neighbors[link].push(slot);
            if self.neighbors[link].len() > M * 2 {
                self.prune(link);
            }
        }
        if self.entry_point.is_none() {
            self.entry_point = Some(slot);
        }
        Ok(())
    }

    pub fn remove(&mut self, embedding_id: &str) -> bool {
        let Some(slot) = self.by_id.remove(embedding_id) else {
            return false;
        };
        self.entries[slot] = None;
        self.live -= 1;
        if self.entry_point == Some(slot) {
            self.entry_point = self.entries.iter().position(Option::is_some);
        }
        true
    }

    /// Drop every embedding belonging to one document.
    pub fn remove_document(&mut self, document_id: &str) -> usize {
        let ids: Vec<String> = self
            .entries
            .iter()
            .flatten()
            .filter(|e| e.document_id == document_id)
            .map(|e| e.id.clone())
            .collect();
        let count = ids.len();
        for id in ids {
            self.remove(&id);
        }
        count
    }

    /// Top-k most similar embeddings, sorted by score descending with ties
    /// broken by embedding id. `kinds` post-filters by document kind.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        kinds: Option<&[Kind]>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        if query.len() != self.dimensions {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut normalized = query.to_vec();
        normalize(&mut normalized);

        let candidates = if self.live <= EXACT_THRESHOLD {
            self.live_slots()
        } else {
            self.beam_candidates(&normalized)
        };

        let mut matches: Vec<VectorMatch> = candidates
            .into_iter()
            .filter_map(|slot| self.entries[slot].as_ref())
            .filter(|entry| {
                kinds.is_none_or(|ks| ks.contains(&entry.document_kind))
            })
            .map(|entry| VectorMatch {
                embedding_id: entry.id.clone(),
                document_id: entry.document_id.clone(),
                document_kind: entry.document_kind,
                score: cosine_similarity(&normalized, &entry.vector).clamp(0.0, 1.0),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.embedding_id.cmp(&b.embedding_id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    // ------------------------------------------------------------------
    // Graph internals
    // ------------------------------------------------------------------

    fn live_slots(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|_| i))
            .collect()
    }

    /// Greedy best-first walk from the entry point, collecting an
    /// `EF_SEARCH`-wide candidate pool.
    fn beam_candidates(&self, query: &[f32]) -> Vec<usize> {
        let Some(start) = self.entry_point else {
            return Vec::new();
        };

        let score_of = |slot: usize| -> f32 {
            self.entries[slot]
                .as_ref()
                .map_or(f32::MIN, |e| cosine_similarity(query, &e.vector))
        };

        let mut visited: HashSet<usize> = HashSet::new();
        let mut frontier: BinaryHeap<ScoredSlot> = BinaryHeap::new();
        let mut pool: Vec<ScoredSlot> = Vec::new();

        visited.insert(start);
        frontier.push(ScoredSlot {
            score: score_of(start),
            slot: start,
        });

        while let Some(current) = frontier.pop() {
            let worst = pool
                .iter()
                .map(|s| s.score)
                .fold(f32::MAX, f32::min);
            if pool.len() >= EF_SEARCH && current.score < worst {
                break;
            }
            let current_slot = current.slot;
            pool.push(current);

            for &next in &self.neighbors[current_slot] {
                if self.entries[next].is_none() || !visited.insert(next) {
                    continue;
                }
                frontier.push(ScoredSlot {
                    score: score_of(next),
                    slot: next,
                });
            }
        }

        pool.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        pool.truncate(EF_SEARCH);
        pool.into_iter().map(|s| s.slot).collect()
    }

    /// Exact or beam-assisted nearest slots used when linking an insert.
    fn nearest_slots(&self, vector: &[f32], k: usize, pool_size: usize) -> Vec<usize> {
        let candidates = if self.live <= pool_size {
            self.live_slots()
        } else {
            self.beam_candidates(vector)
        };

        let mut scored: Vec<(f32, usize)> = candidates
            .into_iter()
            .filter_map(|slot| {
                self.entries[slot]
                    .as_ref()
                    .map(|e| (cosine_similarity(vector, &e.vector), slot))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored.into_iter().map(|(_, slot)| slot).collect()
    }

    /// Keep only the `M` nearest links of a slot.
    fn prune(&mut self, slot: usize) {
        let Some(entry) = self.entries[slot].as_ref() else {
            self.neighbors[slot].clear();
            return;
        };
        let vector = entry.vector.clone();
        let mut scored: Vec<(f32, usize)> = self.neighbors[slot]
            .iter()
            .filter_map(|&n| {
                self.entries[n]
                    .as_ref()
                    .map(|e| (cosine_similarity(&vector, &e.vector), n))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(M);
        self.neighbors[slot] = scored.into_iter().map(|(_, n)| n).collect();
    }
}

struct ScoredSlot {
    score: f32,
    slot: usize,
}

impl PartialEq for ScoredSlot {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.slot == other.slot
    }
}

impl Eq for ScoredSlot {}

impl PartialOrd for ScoredSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn embedding(id: &str, document_id: &str, vector: Vec<f32>) -> Embedding {
        Embedding {
            id: id.into(),
            document_id: document_id.into(),
            document_kind: Kind::Entity,
            section_path: "descripción".into(),
            chunk_index: 0,
            raw_text: String::new(),
            context_text: String::new(),
            vector,
            model: "test".into(),
            dimensions: 3,
            text_hash: "h".into(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn exact_search_orders_by_similarity() {
        let store = VectorStore::build(
            3,
            &[
                embedding("a:descripción:0", "a", vec![1.0, 0.0, 0.0]),
                embedding("b:descripción:0", "b", vec![0.0, 1.0, 0.0]),
                embedding("c:descripción:0", "c", vec![0.7, 0.7, 0.0]),
            ],
        )
        .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].embedding_id, "a:descripción:0");
        assert_eq!(hits[1].embedding_id, "c:descripción:0");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn equal_scores_tie_break_by_id() {
        let store = VectorStore::build(
            3,
            &[
                embedding("z:descripción:0", "z", vec![1.0, 0.0, 0.0]),
                embedding("a:descripción:0", "a", vec![1.0, 0.0, 0.0]),
            ],
        )
        .unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits[0].embedding_id, "a:descripción:0");
    }

    #[test]
    fn kind_post_filter() {
        let mut event = embedding("e:payload:0", "e", vec![1.0, 0.0, 0.0]);
        event.document_kind = Kind::Command;
        let store = VectorStore::build(
            3,
            &[embedding("a:descripción:0", "a", vec![1.0, 0.0, 0.0]), event],
        )
        .unwrap();

        let hits = store
            .search(&[1.0, 0.0, 0.0], 10, Some(&[Kind::Command]))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_kind, Kind::Command);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut store = VectorStore::new(3);
        let bad = embedding("a:descripción:0", "a", vec![1.0, 0.0]);
        assert!(store.add(&bad).is_err());
        assert!(store.search(&[1.0, 0.0], 5, None).is_err());
    }

    #[test]
    fn remove_document_drops_all_its_chunks() {
        let mut store = VectorStore::build(
            3,
            &[
                embedding("a:descripción:0", "a", vec![1.0, 0.0, 0.0]),
                embedding("a:descripción:1", "a", vec![0.9, 0.1, 0.0]),
                embedding("b:descripción:0", "b", vec![0.0, 1.0, 0.0]),
            ],
        )
        .unwrap();

        assert_eq!(store.remove_document("a"), 2);
        assert_eq!(store.len(), 1);
        let hits = store.search(&[1.0, 0.0, 0.0], 10, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "b");
    }

    #[test]
    fn beam_search_finds_nearest_in_larger_index() {
        let mut embeddings = Vec::new();
        for i in 0..400 {
            let angle = (i as f32) * 0.013;
            embeddings.push(embedding(
                &format!("doc{i:03}:descripción:0"),
                &format!("doc{i:03}"),
                vec![angle.cos(), angle.sin(), 0.0],
            ));
        }
        let store = VectorStore::build(3, &embeddings).unwrap();
        assert!(store.len() > EXACT_THRESHOLD);

        let hits = store.search(&[1.0, 0.0, 0.0], 5, None).unwrap();
        assert_eq!(hits.len(), 5);
        // doc000 points exactly along the query axis.
        assert_eq!(hits[0].document_id, "doc000");
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn scores_are_clamped_to_unit_interval() {
        let store = VectorStore::build(
            3,
            &[embedding("a:descripción:0", "a", vec![-1.0, 0.0, 0.0])],
        )
        .unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].score, 0.0);
    }
}

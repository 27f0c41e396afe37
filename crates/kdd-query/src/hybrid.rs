//! Hybrid retrieval: semantic + lexical + graph expansion, fused.
//!
//! Fusion score = `0.6·semantic + 0.3·graph + 0.1·lexical`, plus a 0.05
//! bonus for nodes matched by more than one source, capped at 1.0.

use crate::common::{node_snippet, validate_query_text, Deadline, QueryFilters};
use crate::error::Result;
use crate::snapshot::Snapshot;
use kdd_domain::{kind_priority, EmbeddingModel, GraphEdge, Kind};
use kdd_parser::estimate_tokens;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const WEIGHT_SEMANTIC: f32 = 0.6;
const WEIGHT_GRAPH: f32 = 0.3;
const WEIGHT_LEXICAL: f32 = 0.1;
const MULTI_SOURCE_BONUS: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct HybridInput {
    pub query_text: String,
    pub depth: usize,
    pub max_tokens: usize,
    pub filters: QueryFilters,
}

impl HybridInput {
    #[must_use]
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            depth: 2,
            max_tokens: 8000,
            filters: QueryFilters {
                min_score: 0.5,
                ..QueryFilters::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HybridHit {
    pub node_id: String,
    pub kind: Kind,
    pub score: f32,
    pub snippet: String,
    pub match_source: String,
}

#[derive(Debug, Serialize)]
pub struct HybridResult {
    pub hits: Vec<HybridHit>,
    pub graph_expansion: Vec<GraphEdge>,
    pub total_tokens: usize,
    pub warnings: Vec<String>,
    pub partial: bool,
}

#[derive(Default, Clone, Copy)]
struct SourceScores {
    semantic: f32,
    lexical: f32,
    graph: f32,
}

impl SourceScores {
    fn source_count(self) -> usize {
        usize::from(self.semantic > 0.0)
            + usize::from(self.lexical > 0.0)
            + usize::from(self.graph > 0.0)
    }

    fn fused(self) -> f32 {
        let mut score = self.semantic * WEIGHT_SEMANTIC
            + self.graph * WEIGHT_GRAPH
            + self.lexical * WEIGHT_LEXICAL;
        if self.source_count() > 1 {
            score += MULTI_SOURCE_BONUS;
        }
        score.min(1.0)
    }

    fn match_source(self) -> &'static str {
        match (
            self.semantic > 0.0,
            self.graph > 0.0,
            self.lexical > 0.0,
        ) {
            (true, false, false) => "semantic",
            (false, true, false) => "graph",
            (false, false, true) => "lexical",
            _ => "fusion",
        }
    }
}

/// Run the three sub-passes and fuse. Degrades to graph + lexical on an
/// L1 index, with a `NO_EMBEDDINGS` warning.
pub fn run(
    snapshot: &Snapshot,
    embedder: Option<&dyn EmbeddingModel>,
    input: &HybridInput,
    deadline: &Deadline,
) -> Result<HybridResult> {
    validate_query_text(&input.query_text)?;
    input.filters.validate()?;

    let mut warnings = Vec::new();
    let mut scores: BTreeMap<String, SourceScores> = BTreeMap::new();

    // Pass 1: semantic.
    match (snapshot.vectors.as_ref(), embedder) {
        (Some(vectors), Some(embedder)) => match embedder.embed(&input.query_text) {
            Ok(query_vector) => {
                let matches = vectors
                    .search(&query_vector, input.filters.limit * 3, None)
                    .unwrap_or_default();
                for m in matches {
                    let node_id = m.document_kind.node_id(&m.document_id);
                    if !snapshot.graph.has_node(&node_id) {
                        continue;
                    }
                    let entry = scores.entry(node_id).or_default();
                    entry.semantic = entry.semantic.max(m.score);
                }
            }
            Err(err) => {
                warnings.push(format!("EMBEDDING_FAILED: {err}"));
            }
        },
        _ => warnings.push("NO_EMBEDDINGS: index is L1, semantic pass skipped".to_string()),
    }
    deadline.check_hard()?;

    // Pass 2: lexical over the inverted index.
    let tokens: Vec<String> = tokenize(&input.query_text);
    if !tokens.is_empty() {
        let mut matched_per_node: BTreeMap<String, usize> = BTreeMap::new();
        for token in &tokens {
            if let Some(ids) = snapshot.graph.lexical_hits(token) {
                for id in ids {
                    *matched_per_node.entry(id.clone()).or_default() += 1;
                }
            }
        }
        let phrase = input.query_text.trim().to_lowercase();
        for (node_id, matched) in matched_per_node {
            let Some(node) = snapshot.graph.get_node(&node_id) else {
                continue;
            };
            let mut score = (matched as f32 / tokens.len() as f32) * 0.5;
            if node_text(node).contains(&phrase) {
                score += 0.5;
            }
            let entry = scores.entry(node_id).or_default();
            entry.lexical = entry.lexical.max(score);
        }
    }
    deadline.check_hard()?;

    // Pass 3: graph expansion from every seed found so far.
    let seeds: Vec<(String, f32)> = scores
        .iter()
        .map(|(id, s)| (id.clone(), s.semantic.max(s.lexical)))
        .collect();
    let mut expansion: Vec<GraphEdge> = Vec::new();
    let mut seen_edges: HashSet<(String, String, String)> = HashSet::new();
    let mut partial = false;
    for (seed_id, seed_score) in seeds {
        if deadline.soft_exceeded() {
            partial = true;
            break;
        }
        let traversal = snapshot.graph.traverse(
            &seed_id,
            input.depth,
            None,
            input.filters.respect_layers,
        );
        for edge in traversal.edges {
            if seen_edges.insert(edge.key()) {
                expansion.push(edge);
            }
        }
        for (node_id, distance) in traversal.nodes {
            if node_id == seed_id {
                continue;
            }
            let expanded = seed_score / (1.0 + distance as f32);
            let entry = scores.entry(node_id).or_default();
            entry.graph = entry.graph.max(expanded);
        }
    }
    deadline.check_hard()?;

    // Fusion + filters + ranking.
    let mut ranked: Vec<HybridHit> = scores
        .iter()
        .filter_map(|(node_id, sources)| {
            let node = snapshot.graph.get_node(node_id)?;
            if !input.filters.matches(node) {
                return None;
            }
            let score = sources.fused();
            if score < input.filters.min_score {
                return None;
            }
            Some(HybridHit {
                node_id: node_id.clone(),
                kind: node.kind,
                score,
                snippet: node_snippet(node),
                match_source: sources.match_source().to_string(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| kind_priority(a.kind).cmp(&kind_priority(b.kind)))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });

    // Token budget: stop before a result would exceed it.
    let mut hits = Vec::new();
    let mut total_tokens = 0;
    for hit in ranked {
        let cost = estimate_tokens(&hit.snippet);
        if total_tokens + cost > input.max_tokens && !hits.is_empty() {
            warnings.push("TOKEN_LIMIT_EXCEEDED: results truncated".to_string());
            break;
        }
        total_tokens += cost;
        hits.push(hit);
        if hits.len() >= input.filters.limit {
            break;
        }
    }

    Ok(HybridResult {
        hits,
        graph_expansion: expansion,
        total_tokens,
        warnings,
        partial,
    })
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    tokens.dedup();
    tokens
}

fn node_text(node: &kdd_domain::GraphNode) -> String {
    let mut text = node.id.to_lowercase();
    for alias in &node.aliases {
        text.push(' ');
        text.push_str(&alias.to_lowercase());
    }
    for value in node.indexed_fields.values() {
        if let Some(s) = value.as_str() {
            text.push(' ');
            text.push_str(&s.to_lowercase());
        }
    }
    text
}

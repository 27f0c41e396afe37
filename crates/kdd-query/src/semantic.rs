//! Semantic similarity query.

use crate::common::{validate_query_text, QueryFilters};
use crate::error::{QueryError, Result};
use crate::snapshot::Snapshot;
use kdd_domain::{EmbeddingModel, Kind};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct SemanticInput {
    pub query_text: String,
    pub filters: QueryFilters,
}

impl SemanticInput {
    #[must_use]
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            filters: QueryFilters {
                min_score: 0.7,
                ..QueryFilters::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SemanticHit {
    pub node_id: String,
    pub kind: Kind,
    pub section_path: String,
    pub snippet: String,
    pub raw_text: String,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct SemanticResult {
    pub hits: Vec<SemanticHit>,
    pub total_results: usize,
    pub embedding_model: String,
}

/// Embed the query text and hydrate the nearest chunks to their nodes.
/// Hard-fails with `NO_EMBEDDINGS` on an L1 index.
pub fn run(
    snapshot: &Snapshot,
    embedder: Option<&dyn EmbeddingModel>,
    input: &SemanticInput,
) -> Result<SemanticResult> {
    validate_query_text(&input.query_text)?;
    input.filters.validate()?;

    let vectors = snapshot.vectors.as_ref().ok_or(QueryError::NoEmbeddings)?;
    let embedder = embedder.ok_or(QueryError::NoEmbeddings)?;

    let query_vector = embedder
        .embed(&input.query_text)
        .map_err(|e| QueryError::EmbeddingFailed(e.to_string()))?;

    // Over-fetch to survive node-level dedup and post-filters.
    let kinds = if input.filters.include_kinds.is_empty() {
        None
    } else {
        Some(input.filters.include_kinds.as_slice())
    };
    let matches = vectors
        .search(&query_vector, input.filters.limit * 3, kinds)
        .map_err(|e| QueryError::InvalidParams(e.to_string()))?;

    let mut seen_nodes: Vec<String> = Vec::new();
    let mut hits = Vec::new();
    for m in matches {
        if m.score < input.filters.min_score {
            continue;
        }
        let Some(node) = snapshot.node_for_embedding(&m.document_id, m.document_kind) else {
            continue;
        };
        if !input.filters.matches(node) || seen_nodes.contains(&node.id) {
            continue;
        }
        let Some(embedding) = snapshot.embedding(&m.embedding_id) else {
            continue;
        };

        seen_nodes.push(node.id.clone());
        hits.push(SemanticHit {
            node_id: node.id.clone(),
            kind: node.kind,
            section_path: embedding.section_path.clone(),
            snippet: kdd_parser::extract_snippet(&embedding.raw_text, 200),
            raw_text: embedding.raw_text.clone(),
            score: m.score,
        });
        if hits.len() >= input.filters.limit {
            break;
        }
    }

    Ok(SemanticResult {
        total_results: hits.len(),
        hits,
        embedding_model: embedder.model_name().to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::snapshot::tests::{snapshot_with, snapshot_with_vectors};
    use chrono::Utc;
    use kdd_domain::{Embedding, Layer};

    pub(crate) struct AxisEmbedder;

    impl EmbeddingModel for AxisEmbedder {
        fn model_name(&self) -> &str {
            "test-model"
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn embed(&self, text: &str) -> kdd_domain::Result<Vec<f32>> {
            // Texts about "pedidos" point along x, everything else along y.
            if text.to_lowercase().contains("pedido") {
                Ok(vec![1.0, 0.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0, 0.0])
            }
        }
    }

    pub(crate) fn embedding(document_id: &str, vector: Vec<f32>, raw: &str) -> Embedding {
        Embedding {
            id: Embedding::make_id(document_id, "descripción", 0),
            document_id: document_id.into(),
            document_kind: Kind::Entity,
            section_path: "descripción".into(),
            chunk_index: 0,
            raw_text: raw.into(),
            context_text: format!("[entity: {document_id}] > {raw}"),
            vector,
            model: "test-model".into(),
            dimensions: 3,
            text_hash: "h".into(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn l1_index_hard_fails() {
        let snapshot = snapshot_with(&[("Entity:Pedido", Kind::Entity, Layer::Domain)], &[]);
        let err = run(&snapshot, Some(&AxisEmbedder), &SemanticInput::new("pedido"))
            .unwrap_err();
        assert_eq!(err, QueryError::NoEmbeddings);
    }

    #[test]
    fn short_query_rejected() {
        let snapshot = snapshot_with(&[], &[]);
        let err = run(&snapshot, Some(&AxisEmbedder), &SemanticInput::new("ab")).unwrap_err();
        assert_eq!(err, QueryError::QueryTooShort);
    }

    #[test]
    fn hydrates_matches_to_nodes() {
        let snapshot = snapshot_with_vectors(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("Entity:Usuario", Kind::Entity, Layer::Domain),
            ],
            &[],
            vec![
                embedding("Pedido", vec![1.0, 0.0, 0.0], "Un pedido de compra."),
                embedding("Usuario", vec![0.0, 1.0, 0.0], "Un usuario registrado."),
            ],
            3,
        );

        let mut input = SemanticInput::new("buscar pedido");
        input.filters.min_score = 0.5;
        let result = run(&snapshot, Some(&AxisEmbedder), &input).unwrap();

        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].node_id, "Entity:Pedido");
        assert_eq!(result.hits[0].section_path, "descripción");
        assert!(result.hits[0].score > 0.9);
        assert_eq!(result.embedding_model, "test-model");
    }

    #[test]
    fn min_score_filters_weak_matches() {
        let snapshot = snapshot_with_vectors(
            &[("Entity:Usuario", Kind::Entity, Layer::Domain)],
            &[],
            vec![embedding("Usuario", vec![0.0, 1.0, 0.0], "Un usuario.")],
            3,
        );
        let mut input = SemanticInput::new("buscar pedido");
        input.filters.min_score = 0.7;
        let result = run(&snapshot, Some(&AxisEmbedder), &input).unwrap();
        assert!(result.hits.is_empty());
    }
}

//! Embedding generation over chunked documents.

use crate::chunk::chunk_document;
use chrono::Utc;
use kdd_domain::{Document, Embedding, EmbeddingModel};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Result of embedding one document.
#[derive(Debug)]
pub enum EmbedOutcome {
    /// All chunks embedded (or reused); may be empty for kinds that never
    /// embed.
    Embedded(Vec<Embedding>),
    /// The model failed or returned the wrong dimension; the document is
    /// indexed at L1 and the warning explains why.
    Degraded { warning: String },
}

/// Chunk `document` and produce one embedding per chunk.
///
/// Existing embeddings whose `text_hash` still matches are reused without
/// calling the model. Every generated vector must match
/// `expected_dimensions` (the manifest's); any mismatch degrades the whole
/// document.
#[must_use]
pub fn embed_document(
    document: &Document,
    model: &dyn EmbeddingModel,
    expected_dimensions: usize,
    existing: &[Embedding],
) -> EmbedOutcome {
    let chunks = chunk_document(document);
    if chunks.is_empty() {
        return EmbedOutcome::Embedded(Vec::new());
    }

    let reusable: HashMap<&str, &Embedding> = existing
        .iter()
        .map(|e| (e.id.as_str(), e))
        .collect();

    let mut embeddings = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let id = Embedding::make_id(&document.id, &chunk.section_path, chunk.chunk_index);
        let text_hash = hash_text(&chunk.context_text);

        if let Some(prev) = reusable.get(id.as_str()) {
            if prev.text_hash == text_hash
                && prev.model == model.model_name()
                && prev.dimensions == expected_dimensions
            {
                log::debug!("reusing embedding {id} (unchanged text hash)");
                embeddings.push((*prev).clone());
                continue;
            }
        }

        let vector = match model.embed(&chunk.context_text) {
            Ok(vector) => vector,
            Err(err) => {
                return EmbedOutcome::Degraded {
                    warning: format!("embedding failed for {id}: {err}"),
                };
            }
        };
        if vector.len() != expected_dimensions {
            return EmbedOutcome::Degraded {
                warning: format!(
                    "embedding dimension mismatch for {id}: expected {expected_dimensions}, got {}",
                    vector.len()
                ),
            };
        }

        embeddings.push(Embedding {
            id,
            document_id: document.id.clone(),
            document_kind: document.kind,
            section_path: chunk.section_path,
            chunk_index: chunk.chunk_index,
            raw_text: chunk.raw_text,
            context_text: chunk.context_text,
            vector,
            model: model.model_name().to_string(),
            dimensions: expected_dimensions,
            text_hash,
            generated_at: Utc::now(),
        });
    }

    EmbedOutcome::Embedded(embeddings)
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

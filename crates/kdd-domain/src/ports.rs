//! Boundary traits satisfied by infrastructure adapters.

use crate::error::Result;

/// Maps text to a fixed-dimension vector.
///
/// Implementations must be pure: the same input always yields the same
/// vector. The engine never reads configuration itself; adapters own their
/// API keys and endpoints.
pub trait EmbeddingModel: Send + Sync {
    /// Model identifier recorded in the manifest and on every embedding.
    fn model_name(&self) -> &str;

    /// Output vector length.
    fn dimensions(&self) -> usize;

    /// Embed one text. A failure degrades the affected document to L1.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

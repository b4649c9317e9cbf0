use async_trait::async_trait;

use crate::error::SearchError;

/// Turns query text into a fixed-dimension vector.
///
/// Implementations make at most one outbound call per invocation and never
/// retry internally; retry policy belongs to the caller. Blank input must be
/// rejected with [`SearchError::EmptyQuery`] before any network traffic.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

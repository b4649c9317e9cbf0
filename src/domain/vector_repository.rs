use async_trait::async_trait;

use crate::domain::result::{PointKey, RawHit};
use crate::error::SearchError;

/// Connection to the external similarity-search service.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Runs a nearest-neighbor query. When `exclude_deprecated` is set the
    /// store applies a server-side filter dropping points whose `deprecated`
    /// payload field is true; the filter is never emulated client-side,
    /// since over-fetching could still return fewer than `limit` active
    /// hits. The store may legitimately return fewer than `limit` results,
    /// and it alone defines ordering and tie-break semantics.
    async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        exclude_deprecated: bool,
    ) -> Result<Vec<RawHit>, SearchError>;

    /// Flips the `deprecated` payload field to true on exactly one point.
    /// Idempotent: the store reports a normal update outcome regardless of
    /// the prior value.
    async fn mark_deprecated(&self, id: &PointKey) -> Result<(), SearchError>;
}

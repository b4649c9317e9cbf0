//! Client-side semantic search over a Qdrant collection with
//! downvote-driven soft deletion.
//!
//! A query is embedded through an OpenAI-compatible provider, run as a
//! filtered nearest-neighbor search that excludes previously deprecated
//! points, and published as a normalized, ordered result set. Irrelevant
//! results are suppressed permanently through a two-step confirm gesture
//! that flips a `deprecated` tombstone flag in the store.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod initialization;

/// Re-export necessary items for callers and tests
pub use application::search_session::{SearchSession, SessionState};
pub use config::{load_config, EmbeddingConfig, SearchConfig, StoreConfig};
pub use domain::embedding_provider::EmbeddingProvider;
pub use domain::query::QueryInput;
pub use domain::result::{normalize, PointKey, RawHit, ResultItem};
pub use domain::vector_repository::VectorRepository;
pub use error::SearchError;
pub use infrastructure::embedding::{OpenAiEmbedder, SyntheticEmbedder};
pub use infrastructure::vector_db::{qdrant_client, QdrantStore};
pub use initialization::build_session;

use std::sync::Arc;

use crate::application::search_session::SearchSession;
use crate::config::SearchConfig;
use crate::domain::embedding_provider::EmbeddingProvider;
use crate::domain::vector_repository::VectorRepository;
use crate::error::SearchError;
use crate::infrastructure::embedding::OpenAiEmbedder;
use crate::infrastructure::vector_db::QdrantStore;

/// Assembles provider, store and session from a loaded configuration.
///
/// Both collaborators are plain constructor-injected dependencies, so tests
/// can substitute fakes by calling [`SearchSession::new`] directly.
pub fn build_session(config: &SearchConfig) -> Result<SearchSession, SearchError> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbedder::new(&config.embedding)?);

    let store = QdrantStore::connect(&config.store);
    if let Some(e) = store.init_error() {
        log::warn!("Vector store is unavailable: {}", e);
    }
    let store: Arc<dyn VectorRepository> = Arc::new(store);

    Ok(SearchSession::new(embedder, store, config.limit))
}

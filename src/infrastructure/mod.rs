pub mod embedding;
pub mod vector_db;

// Re-export key types for easier access from the application layer
pub use embedding::{OpenAiEmbedder, SyntheticEmbedder};
pub use vector_db::QdrantStore;

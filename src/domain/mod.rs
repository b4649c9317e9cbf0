pub mod embedding_provider;
pub mod query;
pub mod result;
pub mod vector_repository;

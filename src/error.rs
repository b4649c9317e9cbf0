use thiserror::Error;

/// Typed failures for the whole search pipeline.
///
/// Splitting embed failures from store failures lets a caller distinguish
/// "check your credentials" from "check your network/collection
/// configuration" without parsing message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Query text was empty or whitespace-only. Rejected before any network
    /// call is issued.
    #[error("query text must not be empty")]
    EmptyQuery,

    /// Missing credential or unusable endpoint at construction time. Fatal
    /// to that component instance; recoverable only by reconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding call was rejected upstream. `status` carries the HTTP
    /// status code, or 0 when no HTTP response was received at all.
    #[error("embedding provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The vector store is unreachable or its client was never successfully
    /// initialized.
    #[error("vector store unreachable: {0}")]
    Connection(String),

    /// The store rejected a well-formed-looking search request, e.g. a
    /// dimension mismatch against the collection configuration.
    #[error("vector store rejected the query: {0}")]
    Query(String),

    /// The store rejected a payload update.
    #[error("vector store rejected the payload update: {0}")]
    Update(String),
}

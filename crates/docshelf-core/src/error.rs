//! Error taxonomy shared by every public docshelf operation.
//!
//! Backend traits ([`RelationalStore`](crate::store::RelationalStore),
//! [`VectorIndex`](crate::store::VectorIndex),
//! [`EmbeddingProvider`](crate::embedding::EmbeddingProvider)) report
//! failures as `anyhow::Error`. The orchestrator maps those into one of
//! the variants below before anything reaches a caller, so callers only
//! ever match on [`ShelfError`].

use thiserror::Error;

/// Result alias used by the public operations.
pub type ShelfResult<T> = std::result::Result<T, ShelfError>;

#[derive(Error, Debug)]
pub enum ShelfError {
    /// A referenced document or database id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient data: need at least {required} documents, found {available}")]
    InsufficientData { required: usize, available: usize },

    /// Mismatch between the relational store and the vector index.
    ///
    /// Internal: these are logged and queued for reconcile, never returned
    /// from a public operation.
    #[error("consistency fault: {0}")]
    ConsistencyFault(String),

    /// The embedding provider or the vector index could not be reached.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Relational store I/O failure.
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),

    /// The copy landed in the target database but the source could not be
    /// removed. Both documents now exist until someone resolves it.
    #[error(
        "move partially succeeded: copy {new_id} created but source {source_id} was not removed ({reason})"
    )]
    PartialMove {
        source_id: String,
        new_id: String,
        reason: String,
    },
}

impl ShelfError {
    pub fn document_not_found(id: impl Into<String>) -> Self {
        ShelfError::NotFound {
            kind: "document",
            id: id.into(),
        }
    }

    pub fn database_not_found(id: impl Into<String>) -> Self {
        ShelfError::NotFound {
            kind: "database",
            id: id.into(),
        }
    }

    pub fn provider(err: impl std::fmt::Display) -> Self {
        ShelfError::ProviderUnavailable(err.to_string())
    }

    /// Whether a caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShelfError::ProviderUnavailable(_) | ShelfError::Storage(_)
        )
    }
}

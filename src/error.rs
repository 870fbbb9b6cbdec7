/// Error types for the catalog
///
/// `CatalogError` is what callers of the coordinator and the import pipeline
/// see. `GatewayError` is what a backend gateway reports; it is carried inside
/// `CatalogError::Backend` once a confirm or discovery call fails.
use std::path::PathBuf;
use thiserror::Error;

use crate::state::data::EntityKind;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type for backend gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Mutation target is not in the store. Raised before any optimistic write.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// Malformed input
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The gateway rejected or failed an operation
    #[error("Backend failure: {0}")]
    Backend(#[from] GatewayError),
}

impl CatalogError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        CatalogError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, CatalogError::Backend(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: EntityKind, id: String },

    /// The folder selection step produced nothing
    #[error("no folder selected")]
    NoSelection,

    #[error("rating {0} is out of range (0-5)")]
    RatingOutOfRange(u8),

    #[error("name must not be empty")]
    EmptyName,

    #[error("export destination is not a directory: {}", .0.display())]
    InvalidDestination(PathBuf),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Source file could not be decoded (EXIF, RAW, embedded JPEG)
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The backend refused the request
    #[error("Rejected: {0}")]
    Rejected(String),

    /// A blocking task panicked or was cancelled
    #[error("Task join error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(err: tokio::task::JoinError) -> Self {
        GatewayError::Task(err.to_string())
    }
}

//! Error taxonomy for cloud provider operations.

use thiserror::Error;

/// Result type alias for cloud provider operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors reported by vendor adapters.
///
/// Lookup failures (`NotFound`) are recoverable: the caller reports them
/// and aborts the current sequence only. `Transport` covers connectivity
/// and auth failures. The three operation-specific variants carry the
/// vendor's own explanation verbatim.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("couldn't find {resource} '{search}'")]
    NotFound { resource: String, search: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("power action failed: {0}")]
    ActionFailed(String),

    #[error("instance creation failed: {0}")]
    CreateFailed(String),

    #[error("instance destruction failed: {0}")]
    DestroyFailed(String),
}

impl CloudError {
    /// Build a `NotFound` for a named resource lookup.
    pub fn not_found(resource: impl Into<String>, search: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            search: search.into(),
        }
    }

    /// Whether this error is a lookup miss rather than an operational failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

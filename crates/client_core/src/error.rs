use shared::{ordering::PermutationMismatch, protocol::ConflictDetails};
use thiserror::Error;

/// Failures reported by an [`crate::OrderStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the submission; refetch before retrying.
    #[error("{message}")]
    Validation {
        message: String,
        mismatch: PermutationMismatch,
    },
    #[error(
        "collection changed since version {} (now {})",
        .0.expected_version,
        .0.current_version
    )]
    Conflict(ConflictDetails),
    #[error("order store unavailable: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GestureError {
    #[error("index {index} is out of range for {len} items")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gesture(#[from] GestureError),
    #[error("another reorder is still in flight")]
    Busy,
    #[error("reordering is disabled while a search filter is active")]
    FilterActive,
}

#[derive(Debug, Error)]
pub enum TransportSetupError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

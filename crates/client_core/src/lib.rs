use async_trait::async_trait;
use shared::domain::{CollectionName, ItemId, OrderedSnapshot};

pub mod controller;
pub mod error;
pub mod gesture;
pub mod transport;
pub mod view;

pub use controller::{
    ConcurrencyPolicy, ControllerEvent, ControllerOptions, Notice, NoticeKind, ReorderController,
    ReorderOutcome, ReorderPhase,
};
pub use error::{GestureError, ReorderError, StoreError, TransportSetupError};
pub use gesture::Gesture;
pub use transport::HttpOrderStore;
pub use view::CollectionView;

/// Persistence seam used by the [`ReorderController`].
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_ordered(&self, collection: &CollectionName) -> Result<OrderedSnapshot, StoreError>;

    /// Replaces the whole order of `collection` and returns the new version.
    async fn reassign_ranks(
        &self,
        collection: &CollectionName,
        ordered_ids: &[ItemId],
        expected_version: Option<i64>,
    ) -> Result<i64, StoreError>;
}

pub struct MissingOrderStore;

#[async_trait]
impl OrderStore for MissingOrderStore {
    async fn list_ordered(&self, collection: &CollectionName) -> Result<OrderedSnapshot, StoreError> {
        Err(StoreError::Transport(format!(
            "no order store configured for collection {collection}"
        )))
    }

    async fn reassign_ranks(
        &self,
        collection: &CollectionName,
        _ordered_ids: &[ItemId],
        _expected_version: Option<i64>,
    ) -> Result<i64, StoreError> {
        Err(StoreError::Transport(format!(
            "no order store configured for collection {collection}"
        )))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

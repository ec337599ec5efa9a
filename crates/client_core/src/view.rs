use shared::domain::{CollectionName, ItemId, OrderedItem, OrderedSnapshot};

use crate::{error::GestureError, gesture::Gesture};

/// Immutable picture of a collection handed to renderers.
///
/// Only the [`crate::ReorderController`] produces new views; everyone else
/// reads snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionView {
    collection: CollectionName,
    version: i64,
    items: Vec<OrderedItem>,
}

impl CollectionView {
    pub fn from_snapshot(snapshot: OrderedSnapshot) -> Self {
        Self {
            collection: snapshot.collection,
            version: snapshot.version,
            items: snapshot.items,
        }
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    /// Store version this view is based on.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn items(&self) -> &[OrderedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    /// Items whose name contains `term`, case-insensitively, in display order.
    pub fn matching(&self, term: &str) -> Vec<&OrderedItem> {
        let needle = term.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// The view after `gesture`, with positional ranks; `None` for a no-op.
    pub(crate) fn after(&self, gesture: Gesture) -> Result<Option<Self>, GestureError> {
        let Some(mut items) = gesture.apply(&self.items)? else {
            return Ok(None);
        };
        for (index, item) in items.iter_mut().enumerate() {
            item.rank = Some(index as i64 + 1);
        }
        Ok(Some(Self {
            collection: self.collection.clone(),
            version: self.version,
            items,
        }))
    }

    pub(crate) fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }
}

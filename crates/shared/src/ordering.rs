//! Rules shared by the store and the client for what a valid ordering is.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::domain::{ItemId, OrderedItem};

/// Why a submitted id list is not a permutation of the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationMismatch {
    #[serde(default)]
    pub missing: Vec<ItemId>,
    #[serde(default)]
    pub unexpected: Vec<ItemId>,
    #[serde(default)]
    pub duplicated: Vec<ItemId>,
}

impl PermutationMismatch {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.duplicated.is_empty()
    }
}

impl fmt::Display for PermutationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (label, ids) in [
            ("missing", &self.missing),
            ("unexpected", &self.unexpected),
            ("duplicated", &self.duplicated),
        ] {
            if !ids.is_empty() {
                let joined = ids
                    .iter()
                    .map(ItemId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                parts.push(format!("{label}: [{joined}]"));
            }
        }
        if parts.is_empty() {
            f.write_str("no mismatch")
        } else {
            f.write_str(&parts.join("; "))
        }
    }
}

/// Checks that `submitted` names every id in `current` exactly once and nothing else.
pub fn validate_permutation(
    current: &[ItemId],
    submitted: &[ItemId],
) -> Result<(), PermutationMismatch> {
    let current_set: HashSet<&ItemId> = current.iter().collect();
    let mut seen: HashSet<&ItemId> = HashSet::with_capacity(submitted.len());
    let mut duplicated = BTreeSet::new();
    let mut unexpected = BTreeSet::new();

    for id in submitted {
        if !seen.insert(id) {
            duplicated.insert(id.clone());
        }
        if !current_set.contains(id) {
            unexpected.insert(id.clone());
        }
    }

    let missing: BTreeSet<ItemId> = current
        .iter()
        .filter(|id| !seen.contains(id))
        .cloned()
        .collect();

    let mismatch = PermutationMismatch {
        missing: missing.into_iter().collect(),
        unexpected: unexpected.into_iter().collect(),
        duplicated: duplicated.into_iter().collect(),
    };
    if mismatch.is_empty() {
        Ok(())
    } else {
        Err(mismatch)
    }
}

/// Display comparator: rank ascending with unranked items last, then creation time.
pub fn display_order(a: &OrderedItem, b: &OrderedItem) -> Ordering {
    match (a.rank, b.rank) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.created_at.cmp(&b.created_at))
}

/// Stable sort, so equal keys keep their incoming order.
pub fn sort_for_display(items: &mut [OrderedItem]) {
    items.sort_by(display_order);
}

/// True when `items` already carry ranks `1..=N` in slice order.
pub fn is_densely_ranked(items: &[OrderedItem]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.rank == Some(index as i64 + 1))
}

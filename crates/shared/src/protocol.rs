use serde::{Deserialize, Serialize};

use crate::domain::{CollectionName, ItemId};

pub fn collection_items_route(collection: &CollectionName) -> String {
    format!("/collections/{collection}/items")
}

pub fn collection_reorder_route(collection: &CollectionName) -> String {
    format!("/collections/{collection}/reorder")
}

/// Complete desired ordering of a collection; ranks are derived positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub ordered_ids: Vec<ItemId>,
    /// When present the write only applies if the collection is still at this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderResponse {
    pub success: bool,
    pub version: i64,
    #[serde(default)]
    pub message: String,
}

/// `details` payload of a `conflict` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetails {
    pub expected_version: i64,
    pub current_version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reorder_request_uses_camel_case_keys() {
        let raw = r#"{"orderedIds":["a","b"]}"#;
        let req: ReorderRequest = serde_json::from_str(raw).expect("json");
        assert_eq!(req.ordered_ids, vec![ItemId::from("a"), ItemId::from("b")]);
        assert_eq!(req.expected_version, None);

        let encoded = serde_json::to_value(ReorderRequest {
            ordered_ids: vec![ItemId::from("x")],
            expected_version: Some(4),
        })
        .expect("json");
        assert_eq!(encoded["expectedVersion"], 4);
    }

    #[test]
    fn routes_embed_collection_name() {
        let name = CollectionName::parse("executives").expect("name");
        assert_eq!(collection_items_route(&name), "/collections/executives/items");
        assert_eq!(
            collection_reorder_route(&name),
            "/collections/executives/reorder"
        );
    }
}

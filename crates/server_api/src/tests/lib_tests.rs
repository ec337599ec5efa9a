use super::*;
use shared::domain::{ItemId, Placement};

async fn setup() -> (ApiContext, Vec<ItemId>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let executives = CollectionName::parse("executives").expect("collection");
    let mut ids = Vec::new();
    for name in ["alice", "bob", "carol"] {
        ids.push(
            storage
                .create_item(&executives, name, Placement::Tail)
                .await
                .expect("item")
                .id,
        );
    }
    (ApiContext { storage }, ids)
}

#[tokio::test]
async fn reorder_reports_success_and_new_version() {
    let (ctx, ids) = setup().await;
    let before = list_ordered(&ctx, "executives").await.expect("list");

    let response = reorder(
        &ctx,
        "executives",
        ReorderRequest {
            ordered_ids: vec![ids[2].clone(), ids[0].clone(), ids[1].clone()],
            expected_version: None,
        },
    )
    .await
    .expect("reorder");
    assert!(response.success);
    assert_eq!(response.version, before.version + 1);
    assert_eq!(response.message, "Successfully updated order for 3 items");

    let after = list_ordered(&ctx, "executives").await.expect("list");
    assert_eq!(after.ids(), vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]);
}

#[tokio::test]
async fn invalid_permutation_maps_to_validation_with_details() {
    let (ctx, ids) = setup().await;
    let err = reorder(
        &ctx,
        "executives",
        ReorderRequest {
            ordered_ids: vec![ids[0].clone(), ids[1].clone()],
            expected_version: None,
        },
    )
    .await
    .expect_err("must reject");

    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(err.message, "invalid permutation");
    let details = err.details.expect("details");
    assert_eq!(details["missing"][0], ids[2].as_str());
}

#[tokio::test]
async fn stale_version_maps_to_conflict() {
    let (ctx, ids) = setup().await;
    let err = reorder(
        &ctx,
        "executives",
        ReorderRequest {
            ordered_ids: ids,
            expected_version: Some(1),
        },
    )
    .await
    .expect_err("stale");

    assert_eq!(err.code, ErrorCode::Conflict);
    let details: ConflictDetails =
        serde_json::from_value(err.details.expect("details")).expect("conflict details");
    assert_eq!(details.expected_version, 1);
    assert_eq!(details.current_version, 3);
}

#[tokio::test]
async fn malformed_collection_name_is_a_validation_error() {
    let (ctx, _) = setup().await;
    let err = list_ordered(&ctx, "no such/name")
        .await
        .expect_err("invalid name");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn health_reports_live_storage() {
    let (ctx, _) = setup().await;
    health(&ctx).await.expect("healthy");
}

#[tokio::test]
async fn storage_failure_maps_to_internal_with_details() {
    let (ctx, ids) = setup().await;
    ctx.storage.pool().close().await;

    let err = reorder(
        &ctx,
        "executives",
        ReorderRequest {
            ordered_ids: ids,
            expected_version: None,
        },
    )
    .await
    .expect_err("closed pool");
    assert_eq!(err.code, ErrorCode::Internal);
    assert_eq!(err.message, "failed to persist order");
    let details = err.details.expect("details");
    assert!(details.as_str().is_some_and(|text| text.contains("closed")));

    let err = list_ordered(&ctx, "executives")
        .await
        .expect_err("closed pool");
    assert_eq!(err.code, ErrorCode::Internal);
    assert!(health(&ctx).await.is_err());
}

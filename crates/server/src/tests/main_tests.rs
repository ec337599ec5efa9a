use super::*;
use axum::{body, body::Body, http::Request};
use shared::domain::{CollectionName, ItemId, Placement};
use tower::ServiceExt;

async fn test_app() -> (Router, Storage, Vec<ItemId>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let executives = CollectionName::parse("executives").expect("collection");
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        ids.push(
            storage
                .create_item(&executives, name, Placement::Tail)
                .await
                .expect("item")
                .id,
        );
    }

    let app = build_router(
        Arc::new(AppState {
            api: ApiContext {
                storage: storage.clone(),
            },
        }),
        4 * 1024,
    );
    (app, storage, ids)
}

fn reorder_request(ids: &[&ItemId]) -> Request<Body> {
    Request::post("/collections/executives/reorder")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "orderedIds": ids }).to_string(),
        ))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage, _ids) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn items_route_lists_in_rank_order() {
    let (app, _storage, ids) = test_app().await;
    let request = Request::get("/collections/executives/items")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot: OrderedSnapshot =
        serde_json::from_value(json_body(response).await).expect("snapshot");
    assert_eq!(snapshot.ids(), ids);
    assert_eq!(snapshot.version, 3);
}

#[tokio::test]
async fn reorder_route_persists_submitted_order() {
    let (app, storage, ids) = test_app().await;
    let response = app
        .oneshot(reorder_request(&[&ids[2], &ids[0], &ids[1]]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["version"], 4);

    let snapshot = storage
        .list_ordered(&CollectionName::parse("executives").expect("collection"))
        .await
        .expect("list");
    assert_eq!(
        snapshot.ids(),
        vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]
    );
}

#[tokio::test]
async fn reorder_route_rejects_partial_permutation_with_400() {
    let (app, storage, ids) = test_app().await;
    let response = app
        .oneshot(reorder_request(&[&ids[0], &ids[1]]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid permutation");
    assert_eq!(body["code"], "validation");
    assert_eq!(body["details"]["missing"][0], ids[2].as_str());

    let snapshot = storage
        .list_ordered(&CollectionName::parse("executives").expect("collection"))
        .await
        .expect("list");
    assert_eq!(snapshot.ids(), ids);
}

#[tokio::test]
async fn reorder_route_reports_stale_version_as_409() {
    let (app, _storage, ids) = test_app().await;
    let request = Request::post("/collections/executives/reorder")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "orderedIds": ids, "expectedVersion": 1 }).to_string(),
        ))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["details"]["currentVersion"], 3);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let (app, _storage, _ids) = test_app().await;
    let request = Request::post("/collections/executives/reorder")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"executiveIds": 42}"#))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(response.status().is_client_error());
    let body = json_body(response).await;
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let (app, _storage, _ids) = test_app().await;
    let ids: Vec<String> = (0..1_000).map(|i| format!("id-{i:08}")).collect();
    let request = Request::post("/collections/executives/reorder")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "orderedIds": ids }).to_string(),
        ))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn invalid_collection_name_is_rejected() {
    let (app, _storage, _ids) = test_app().await;
    let request = Request::get("/collections/bad%20name/items")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_failure_is_reported_as_500() {
    let (app, storage, ids) = test_app().await;
    storage.pool().close().await;

    let response = app
        .oneshot(reorder_request(&[&ids[2], &ids[0], &ids[1]]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "internal");
    assert_eq!(body["error"], "failed to persist order");
    assert!(body["details"].is_string());
}

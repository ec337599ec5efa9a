use shared::domain::{CollectionName, ItemId, Placement};
use storage::{ReassignError, Storage};

async fn abc(storage: &Storage, collection: &CollectionName) -> (ItemId, ItemId, ItemId) {
    let a = storage
        .create_item(collection, "A", Placement::Tail)
        .await
        .expect("A");
    let b = storage
        .create_item(collection, "B", Placement::Tail)
        .await
        .expect("B");
    let c = storage
        .create_item(collection, "C", Placement::Tail)
        .await
        .expect("C");
    (a.id, b.id, c.id)
}

#[tokio::test]
async fn moving_last_item_to_front_persists_dense_ranks() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let executives = CollectionName::parse("executives").expect("collection");
    let (a, b, c) = abc(&storage, &executives).await;

    storage
        .reassign_ranks(&executives, &[c.clone(), a.clone(), b.clone()], None)
        .await
        .expect("reorder");

    let snapshot = storage.list_ordered(&executives).await.expect("list");
    let order: Vec<(&str, Option<i64>)> = snapshot
        .items
        .iter()
        .map(|item| (item.name.as_str(), item.rank))
        .collect();
    assert_eq!(order, vec![("C", Some(1)), ("A", Some(2)), ("B", Some(3))]);
}

#[tokio::test]
async fn partial_submission_is_rejected_without_side_effects() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let executives = CollectionName::parse("executives").expect("collection");
    let (a, b, c) = abc(&storage, &executives).await;
    let before = storage.list_ordered(&executives).await.expect("list");

    let err = storage
        .reassign_ranks(&executives, &[a, b], None)
        .await
        .expect_err("partial ordering");
    match err {
        ReassignError::InvalidPermutation(mismatch) => assert_eq!(mismatch.missing, vec![c]),
        other => panic!("unexpected error: {other:?}"),
    }

    let after = storage.list_ordered(&executives).await.expect("list");
    assert_eq!(after, before);
}

#[tokio::test]
async fn reopening_a_file_database_keeps_the_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}",
        dir.path().join("ranks.db").to_string_lossy().replace('\\', "/")
    );
    let executives = CollectionName::parse("executives").expect("collection");

    let (a, b, c) = {
        let storage = Storage::new(&url).await.expect("db");
        let ids = abc(&storage, &executives).await;
        storage
            .reassign_ranks(&executives, &[ids.1.clone(), ids.2.clone(), ids.0.clone()], None)
            .await
            .expect("reorder");
        storage.pool().close().await;
        ids
    };

    let storage = Storage::new(&url).await.expect("reopen");
    let snapshot = storage.list_ordered(&executives).await.expect("list");
    assert_eq!(snapshot.ids(), vec![b, c, a]);
}

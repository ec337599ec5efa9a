use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::Mutex;

use shared::{
    domain::{CollectionName, ItemId, OrderedItem, OrderedSnapshot, Placement},
    ordering::{is_densely_ranked, validate_permutation, PermutationMismatch},
};

/// Durable `item -> rank` assignments for every collection.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    write_gate: Arc<Mutex<()>>,
}

#[derive(Debug, Error)]
pub enum ReassignError {
    #[error("invalid permutation ({0})")]
    InvalidPermutation(PermutationMismatch),
    #[error("collection is at version {current}, expected {expected}")]
    VersionConflict { expected: i64, current: i64 },
    #[error("storage failure: {0}")]
    Backend(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub collection: CollectionName,
    pub version: i64,
    pub item_count: i64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let mut connect_options =
            SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if sqlite_path(database_url).is_some() {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Items in display order together with the version they were read at.
    pub async fn list_ordered(&self, collection: &CollectionName) -> Result<OrderedSnapshot> {
        let mut tx = self.pool.begin().await?;
        let version = collection_version(&mut tx, collection).await?;
        let items = load_items(&mut tx, collection).await?;
        tx.commit().await?;
        Ok(OrderedSnapshot {
            collection: collection.clone(),
            version,
            items,
        })
    }

    /// Replaces the whole order of `collection` with `ordered_ids`, rank = position + 1.
    ///
    /// Rejects anything that is not an exact permutation of the current ids, and,
    /// when `expected_version` is given, any write against a newer version. Both
    /// rejections leave the stored ranks untouched. Returns the collection version
    /// after the write.
    pub async fn reassign_ranks(
        &self,
        collection: &CollectionName,
        ordered_ids: &[ItemId],
        expected_version: Option<i64>,
    ) -> Result<i64, ReassignError> {
        let _write = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        claim_collection(&mut tx, collection).await?;

        let current = collection_version(&mut tx, collection).await?;
        if let Some(expected) = expected_version {
            if expected != current {
                return Err(ReassignError::VersionConflict { expected, current });
            }
        }

        let items = load_items(&mut tx, collection).await?;
        let current_ids: Vec<ItemId> = items.iter().map(|item| item.id.clone()).collect();
        validate_permutation(&current_ids, ordered_ids)
            .map_err(ReassignError::InvalidPermutation)?;

        if current_ids == ordered_ids && is_densely_ranked(&items) {
            return Ok(current);
        }

        write_ranks(&mut tx, collection, ordered_ids).await?;
        let version = bump_version(&mut tx, collection).await?;
        tx.commit().await?;
        Ok(version)
    }

    pub async fn create_item(
        &self,
        collection: &CollectionName,
        name: &str,
        placement: Placement,
    ) -> Result<OrderedItem> {
        let _write = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        claim_collection(&mut tx, collection).await?;

        let rank = match placement {
            Placement::Tail => {
                let next: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(rank), 0) + 1 FROM ordered_items WHERE collection = ?",
                )
                .bind(collection.as_str())
                .fetch_one(&mut *tx)
                .await?;
                Some(next)
            }
            Placement::Unranked => None,
        };

        let item = OrderedItem {
            id: ItemId::generate(),
            collection: collection.clone(),
            name: name.to_string(),
            rank,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO ordered_items (id, collection, name, rank, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(item.id.as_str())
        .bind(collection.as_str())
        .bind(&item.name)
        .bind(item.rank)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert item into '{collection}'"))?;

        bump_version(&mut tx, collection).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Removes an item and closes the gap it leaves in the ranks.
    pub async fn delete_item(&self, collection: &CollectionName, id: &ItemId) -> Result<bool> {
        let _write = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        claim_collection(&mut tx, collection).await?;

        let removed = sqlx::query("DELETE FROM ordered_items WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Ok(false);
        }

        let ranked: Vec<ItemId> = load_items(&mut tx, collection)
            .await?
            .into_iter()
            .filter(|item| item.rank.is_some())
            .map(|item| item.id)
            .collect();
        write_ranks(&mut tx, collection, &ranked).await?;
        bump_version(&mut tx, collection).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Rewrites ranks to `1..=N` in the current display order, ranking unranked items too.
    pub async fn compact_ranks(&self, collection: &CollectionName) -> Result<i64> {
        let _write = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        claim_collection(&mut tx, collection).await?;

        let items = load_items(&mut tx, collection).await?;
        if is_densely_ranked(&items) {
            return Ok(collection_version(&mut tx, collection).await?);
        }

        let ids: Vec<ItemId> = items.into_iter().map(|item| item.id).collect();
        write_ranks(&mut tx, collection, &ids).await?;
        let version = bump_version(&mut tx, collection).await?;
        tx.commit().await?;
        Ok(version)
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let rows = sqlx::query(
            "SELECT c.name, c.version, COUNT(i.id)
             FROM collections c
             LEFT JOIN ordered_items i ON i.collection = c.name
             GROUP BY c.name, c.version
             ORDER BY c.name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let name = r.get::<String, _>(0);
                Ok::<_, anyhow::Error>(CollectionSummary {
                    collection: CollectionName::parse(&name)?,
                    version: r.get::<i64, _>(1),
                    item_count: r.get::<i64, _>(2),
                })
            })
            .collect()
    }
}

/// Ensures the collection row exists. Being a write, it also takes SQLite's
/// write lock before the transaction reads anything.
async fn claim_collection(
    conn: &mut SqliteConnection,
    collection: &CollectionName,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO collections (name, version) VALUES (?, 0) ON CONFLICT(name) DO NOTHING")
        .bind(collection.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn collection_version(
    conn: &mut SqliteConnection,
    collection: &CollectionName,
) -> Result<i64, sqlx::Error> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM collections WHERE name = ?")
        .bind(collection.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(version.unwrap_or(0))
}

async fn bump_version(
    conn: &mut SqliteConnection,
    collection: &CollectionName,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("UPDATE collections SET version = version + 1 WHERE name = ? RETURNING version")
        .bind(collection.as_str())
        .fetch_one(&mut *conn)
        .await
}

async fn load_items(
    conn: &mut SqliteConnection,
    collection: &CollectionName,
) -> Result<Vec<OrderedItem>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, name, rank, created_at
         FROM ordered_items
         WHERE collection = ?
         ORDER BY rank IS NULL, rank ASC, created_at ASC, rowid ASC",
    )
    .bind(collection.as_str())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| OrderedItem {
            id: ItemId(r.get::<String, _>(0)),
            collection: collection.clone(),
            name: r.get::<String, _>(1),
            rank: r.get::<Option<i64>, _>(2),
            created_at: r.get::<DateTime<Utc>, _>(3),
        })
        .collect())
}

/// Assigns rank = position + 1 to `ids`; every other item becomes unranked.
async fn write_ranks(
    conn: &mut SqliteConnection,
    collection: &CollectionName,
    ids: &[ItemId],
) -> Result<(), sqlx::Error> {
    // Clear first: the unique (collection, rank) index would trip on transient duplicates.
    sqlx::query("UPDATE ordered_items SET rank = NULL WHERE collection = ?")
        .bind(collection.as_str())
        .execute(&mut *conn)
        .await?;

    for (index, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE ordered_items SET rank = ? WHERE collection = ? AND id = ?")
            .bind(index as i64 + 1)
            .bind(collection.as_str())
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() || path == ":memory:" {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

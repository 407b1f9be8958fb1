//! SQLite persistence for caelum-shards
//!
//! One database file (`caelum.db`) in the root folder holds the reflection
//! records, outstanding mint claims and the aggregate counters row.

pub mod counters;
pub mod reflections;

pub use counters::SqliteCounterStore;
pub use reflections::SqliteReflectionStore;

use caelum_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database and ensure the schema exists
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Pinned to a single connection: every new `:memory:` connection would
/// otherwise open its own empty database.
pub async fn init_in_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reflections (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            queued INTEGER NOT NULL DEFAULT 0,
            minted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FIFO pick for the batch processor walks this index
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_reflections_pending
            ON reflections (queued, minted, created_at, id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mint_claims (
            reflection_id TEXT PRIMARY KEY,
            content_id TEXT NOT NULL,
            claimed_at TEXT NOT NULL,
            reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS counters (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            shards INTEGER NOT NULL DEFAULT 0,
            whispers INTEGER NOT NULL DEFAULT 0,
            pof_actions INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO counters (id, updated_at) VALUES (1, ?)")
        .bind(caelum_common::time::now())
        .execute(pool)
        .await?;

    info!("Database tables initialized (reflections, mint_claims, counters)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_tables_is_idempotent() {
        let pool = init_in_memory_pool().await.unwrap();
        init_tables(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM counters")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("caelum.db");

        let pool = init_database_pool(&path).await.unwrap();
        assert!(path.exists());
        pool.close().await;

        // Reopen keeps the counters row single
        let pool = init_database_pool(&path).await.unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM counters")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}

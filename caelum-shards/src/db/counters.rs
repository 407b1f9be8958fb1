//! Aggregate counters in the single-row `counters` table
//!
//! Increments are one `UPDATE ... RETURNING` statement each, so concurrent
//! callers never read-modify-write in application code.

use async_trait::async_trait;
use caelum_common::{time, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Counter, Stats};
use crate::store::CounterStore;

type CounterRow = (i64, i64, i64, DateTime<Utc>);

fn to_stats((shards, whispers, pof_actions, updated_at): CounterRow) -> Stats {
    Stats {
        shards: shards.max(0) as u64,
        whispers: whispers.max(0) as u64,
        pof_actions: pof_actions.max(0) as u64,
        updated_at,
    }
}

#[derive(Clone)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn increment(&self, counter: Counter) -> Result<Stats> {
        // Column name comes from a closed enum, never from input
        let sql = format!(
            "UPDATE counters SET {col} = {col} + 1, updated_at = ? WHERE id = 1 \
             RETURNING shards, whispers, pof_actions, updated_at",
            col = counter.column()
        );
        let row: CounterRow = sqlx::query_as(&sql)
            .bind(time::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(to_stats(row))
    }

    async fn snapshot(&self) -> Result<Stats> {
        let row: CounterRow = sqlx::query_as(
            "SELECT shards, whispers, pof_actions, updated_at FROM counters WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(to_stats(row))
    }

    async fn overwrite(&self, shards: u64, whispers: u64, pof_actions: u64) -> Result<Stats> {
        let row: CounterRow = sqlx::query_as(
            r#"
            UPDATE counters
               SET shards = ?, whispers = ?, pof_actions = ?, updated_at = ?
             WHERE id = 1
            RETURNING shards, whispers, pof_actions, updated_at
            "#,
        )
        .bind(shards as i64)
        .bind(whispers as i64)
        .bind(pof_actions as i64)
        .bind(time::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(to_stats(row))
    }
}

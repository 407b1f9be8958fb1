//! SQLite reflection store
//!
//! Each record is kept as a JSON document in `body`. The `queued`, `minted`
//! and `created_at` columns mirror the document so the pending pick can use
//! the `(queued, minted, created_at, id)` index instead of a full scan.

use async_trait::async_trait;
use caelum_common::{time, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{MintClaim, ReflectionRecord};
use crate::store::{ReflectionStore, Versioned};

#[derive(Clone)]
pub struct SqliteReflectionStore {
    pool: SqlitePool,
}

impl SqliteReflectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM reflections WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

fn decode(body: &str) -> Result<ReflectionRecord> {
    Ok(serde_json::from_str(body)?)
}

#[async_trait]
impl ReflectionStore for SqliteReflectionStore {
    async fn insert(&self, record: &ReflectionRecord) -> Result<()> {
        let body = serde_json::to_string(record)?;
        let result = sqlx::query(
            r#"
            INSERT INTO reflections (id, body, version, queued, minted, created_at)
            VALUES (?, ?, 0, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(body)
        .bind(record.is_queued())
        .bind(record.is_minted())
        .bind(time::sortable(record.timestamp))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AlreadyExists(format!("reflection {}", record.id)));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Versioned>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT body, version FROM reflections WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(body, version)| {
            Ok(Versioned {
                record: decode(&body)?,
                version,
            })
        })
        .transpose()
    }

    async fn scan(&self) -> Result<Vec<ReflectionRecord>> {
        let bodies: Vec<String> = sqlx::query_scalar("SELECT body FROM reflections")
            .fetch_all(&self.pool)
            .await?;
        bodies.iter().map(|b| decode(b)).collect()
    }

    async fn compare_and_swap(
        &self,
        record: &ReflectionRecord,
        expected_version: i64,
    ) -> Result<bool> {
        let body = serde_json::to_string(record)?;
        let result = sqlx::query(
            r#"
            UPDATE reflections
               SET body = ?, version = version + 1, queued = ?, minted = ?
             WHERE id = ? AND version = ?
            "#,
        )
        .bind(body)
        .bind(record.is_queued())
        .bind(record.is_minted())
        .bind(&record.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if !self.exists(&record.id).await? {
            return Err(Error::NotFound(format!("reflection {}", record.id)));
        }
        Ok(false)
    }

    async fn claim_mint(&self, claim: &MintClaim) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO mint_claims (reflection_id, content_id, claimed_at, reason)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(reflection_id) DO NOTHING
            "#,
        )
        .bind(&claim.reflection_id)
        .bind(&claim.content_id)
        .bind(claim.claimed_at)
        .bind(&claim.reason)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_mint(&self, reflection_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mint_claims WHERE reflection_id = ?")
            .bind(reflection_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mint_claims(&self) -> Result<Vec<MintClaim>> {
        let rows: Vec<(String, String, DateTime<Utc>, Option<String>)> = sqlx::query_as(
            "SELECT reflection_id, content_id, claimed_at, reason FROM mint_claims ORDER BY claimed_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(reflection_id, content_id, claimed_at, reason)| MintClaim {
                reflection_id,
                content_id,
                claimed_at,
                reason,
            })
            .collect())
    }

    async fn mint_claim(&self, reflection_id: &str) -> Result<Option<MintClaim>> {
        let row: Option<(String, String, DateTime<Utc>, Option<String>)> = sqlx::query_as(
            "SELECT reflection_id, content_id, claimed_at, reason FROM mint_claims WHERE reflection_id = ?",
        )
        .bind(reflection_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(reflection_id, content_id, claimed_at, reason)| MintClaim {
            reflection_id,
            content_id,
            claimed_at,
            reason,
        }))
    }

    async fn oldest_pending(&self) -> Result<Option<ReflectionRecord>> {
        let body: Option<String> = sqlx::query_scalar(
            r#"
            SELECT r.body FROM reflections r
             WHERE r.queued = 1 AND r.minted = 0
               AND NOT EXISTS (SELECT 1 FROM mint_claims c WHERE c.reflection_id = r.id)
             ORDER BY r.created_at, r.id
             LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        body.as_deref().map(decode).transpose()
    }
}

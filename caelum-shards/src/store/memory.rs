//! In-process store backends
//!
//! Used by unit tests and for embedding the pipeline without a database.

use async_trait::async_trait;
use caelum_common::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use super::{CounterStore, ReflectionStore, Versioned};
use crate::models::{Counter, MintClaim, ReflectionRecord, Stats};

#[derive(Default)]
pub struct MemoryReflectionStore {
    records: RwLock<HashMap<String, Versioned>>,
    claims: Mutex<HashMap<String, MintClaim>>,
}

impl MemoryReflectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReflectionStore for MemoryReflectionStore {
    async fn insert(&self, record: &ReflectionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(Error::AlreadyExists(format!("reflection {}", record.id)));
        }
        records.insert(
            record.id.clone(),
            Versioned {
                record: record.clone(),
                version: 0,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Versioned>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn scan(&self) -> Result<Vec<ReflectionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .map(|v| v.record.clone())
            .collect())
    }

    async fn compare_and_swap(
        &self,
        record: &ReflectionRecord,
        expected_version: i64,
    ) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(current) if current.version == expected_version => {
                current.record = record.clone();
                current.version += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(Error::NotFound(format!("reflection {}", record.id))),
        }
    }

    async fn claim_mint(&self, claim: &MintClaim) -> Result<bool> {
        let mut claims = self.claims.lock().await;
        if claims.contains_key(&claim.reflection_id) {
            return Ok(false);
        }
        claims.insert(claim.reflection_id.clone(), claim.clone());
        Ok(true)
    }

    async fn release_mint(&self, reflection_id: &str) -> Result<bool> {
        Ok(self.claims.lock().await.remove(reflection_id).is_some())
    }

    async fn mint_claims(&self) -> Result<Vec<MintClaim>> {
        let mut claims: Vec<MintClaim> = self.claims.lock().await.values().cloned().collect();
        claims.sort_by(|a, b| a.claimed_at.cmp(&b.claimed_at));
        Ok(claims)
    }
}

pub struct MemoryCounterStore {
    stats: Mutex<Stats>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(Stats::zero()),
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, counter: Counter) -> Result<Stats> {
        let mut stats = self.stats.lock().await;
        match counter {
            Counter::Shards => stats.shards += 1,
            Counter::Whispers => stats.whispers += 1,
            Counter::PofActions => stats.pof_actions += 1,
        }
        stats.updated_at = Utc::now();
        Ok(stats.clone())
    }

    async fn snapshot(&self) -> Result<Stats> {
        Ok(self.stats.lock().await.clone())
    }

    async fn overwrite(&self, shards: u64, whispers: u64, pof_actions: u64) -> Result<Stats> {
        let mut stats = self.stats.lock().await;
        *stats = Stats {
            shards,
            whispers,
            pof_actions,
            updated_at: Utc::now(),
        };
        Ok(stats.clone())
    }
}

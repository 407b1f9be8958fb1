//! Reflection and counter storage abstractions
//!
//! Backends implement a small keyed primitive set (insert / get / scan /
//! compare-and-swap plus mint-claim bookkeeping). The record operations the
//! rest of the service uses (`save`, `load`, `list`, `update`, `modify`) are
//! provided on top of those primitives, so every backend gets the same
//! merge semantics and the same optimistic-concurrency retry loop.

pub mod memory;

pub use memory::{MemoryCounterStore, MemoryReflectionStore};

use async_trait::async_trait;
use caelum_common::{Error, Result};
use std::collections::HashSet;
use tracing::debug;

use crate::models::{Counter, MintClaim, ReflectionPatch, ReflectionRecord, Stats};
use crate::queue::QueueSelector;

/// Attempts made by `modify` before giving up with `Error::Conflict`
pub const MAX_CAS_ATTEMPTS: usize = 16;

/// A record together with the version its compare-and-swap must match
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub record: ReflectionRecord,
    pub version: i64,
}

/// Closure applied by `modify` to a fresh copy of the record on every attempt
pub type Mutation<'a> = &'a (dyn Fn(&mut ReflectionRecord) -> Result<()> + Send + Sync);

#[async_trait]
pub trait ReflectionStore: Send + Sync {
    /// Create-only write; `Error::AlreadyExists` if the id is taken
    async fn insert(&self, record: &ReflectionRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Versioned>>;

    /// Every record, in no particular order
    async fn scan(&self) -> Result<Vec<ReflectionRecord>>;

    /// Replace the record if its stored version still equals `expected_version`
    ///
    /// Returns `false` when another writer got there first.
    async fn compare_and_swap(&self, record: &ReflectionRecord, expected_version: i64)
        -> Result<bool>;

    /// Persist a mint claim; `false` if the record is already claimed
    async fn claim_mint(&self, claim: &MintClaim) -> Result<bool>;

    /// Drop a mint claim; `false` if there was none
    async fn release_mint(&self, reflection_id: &str) -> Result<bool>;

    async fn mint_claims(&self) -> Result<Vec<MintClaim>>;

    /// Outstanding claim for one record, if any
    async fn mint_claim(&self, reflection_id: &str) -> Result<Option<MintClaim>> {
        Ok(self
            .mint_claims()
            .await?
            .into_iter()
            .find(|c| c.reflection_id == reflection_id))
    }

    /// Oldest queued, unminted, unclaimed record
    ///
    /// Default implementation sorts a full scan; indexed backends override it.
    async fn oldest_pending(&self) -> Result<Option<ReflectionRecord>> {
        let held: HashSet<String> = self
            .mint_claims()
            .await?
            .into_iter()
            .map(|c| c.reflection_id)
            .collect();
        let records = self.scan().await?;
        Ok(QueueSelector::next_for_mint(records.iter().filter(|r| !held.contains(&r.id))).cloned())
    }

    /// Persist a new record
    async fn save(&self, record: &ReflectionRecord) -> Result<()> {
        record.validate().map_err(Error::InvalidInput)?;
        self.insert(record).await
    }

    async fn load(&self, id: &str) -> Result<ReflectionRecord> {
        self.get(id)
            .await?
            .map(|v| v.record)
            .ok_or_else(|| Error::NotFound(format!("reflection {}", id)))
    }

    async fn list(&self) -> Result<Vec<ReflectionRecord>> {
        self.scan().await
    }

    /// Shallow-merge `patch` into the stored record
    async fn update(&self, id: &str, patch: &ReflectionPatch) -> Result<ReflectionRecord> {
        self.modify(id, &|record: &mut ReflectionRecord| {
            patch.apply(record);
            Ok(())
        })
        .await
    }

    /// Read-modify-write with compare-and-swap
    ///
    /// The mutation runs against the latest version on every attempt, so a
    /// concurrent writer can delay but never erase this write. `id` and
    /// `timestamp` are restored after the mutation; the result must pass
    /// `ReflectionRecord::validate`.
    async fn modify(&self, id: &str, mutation: Mutation<'_>) -> Result<ReflectionRecord> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self
                .get(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("reflection {}", id)))?;

            let mut next = current.record.clone();
            mutation(&mut next)?;
            next.id = current.record.id.clone();
            next.timestamp = current.record.timestamp;
            next.validate().map_err(Error::InvalidInput)?;

            if self.compare_and_swap(&next, current.version).await? {
                return Ok(next);
            }

            debug!(id, attempt, "Reflection version moved underneath update, retrying");
            tokio::task::yield_now().await;
        }

        Err(Error::Conflict(format!(
            "reflection {} kept changing after {} attempts",
            id, MAX_CAS_ATTEMPTS
        )))
    }
}

/// Aggregate counters service, independent of record mutation
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one to `counter`
    async fn increment(&self, counter: Counter) -> Result<Stats>;

    async fn snapshot(&self) -> Result<Stats>;

    /// Replace all counters (used by rebuild)
    async fn overwrite(&self, shards: u64, whispers: u64, pof_actions: u64) -> Result<Stats>;
}

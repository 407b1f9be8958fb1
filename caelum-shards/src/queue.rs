//! Queue selection policy
//!
//! Pure functions over a snapshot of records. Nothing here touches storage.

use serde::Deserialize;
use std::cmp::Ordering;

use crate::models::ReflectionRecord;

/// Minimum shard intent for a record to be offered as a mint candidate
pub const CANDIDATE_MIN_SHARD_INTENT: f64 = 0.72;
/// Minimum confidence for a record to be offered as a mint candidate
pub const CANDIDATE_MIN_CONFIDENCE: f64 = 0.60;

/// Which slice of the store a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    All,
    Queued,
    Candidates,
}

pub struct QueueSelector;

impl QueueSelector {
    pub fn is_candidate(record: &ReflectionRecord) -> bool {
        record.shard_intent >= CANDIDATE_MIN_SHARD_INTENT
            && record.confidence >= CANDIDATE_MIN_CONFIDENCE
    }

    pub fn queued(records: Vec<ReflectionRecord>) -> Vec<ReflectionRecord> {
        records.into_iter().filter(ReflectionRecord::is_queued).collect()
    }

    pub fn candidates(records: Vec<ReflectionRecord>) -> Vec<ReflectionRecord> {
        records.into_iter().filter(Self::is_candidate).collect()
    }

    /// Filter to `view` and order newest first
    pub fn view(records: Vec<ReflectionRecord>, view: View) -> Vec<ReflectionRecord> {
        let mut selected = match view {
            View::All => records,
            View::Queued => Self::queued(records),
            View::Candidates => Self::candidates(records),
        };
        Self::sort_newest_first(&mut selected);
        selected
    }

    /// Oldest pending record (queued and not minted); ties broken by id
    pub fn next_for_mint<'a, I>(records: I) -> Option<&'a ReflectionRecord>
    where
        I: IntoIterator<Item = &'a ReflectionRecord>,
    {
        records
            .into_iter()
            .filter(|r| r.is_pending())
            .min_by(|a, b| fifo_order(a, b))
    }

    pub fn sort_newest_first(records: &mut [ReflectionRecord]) {
        records.sort_by(|a, b| fifo_order(b, a));
    }
}

fn fifo_order(a: &ReflectionRecord, b: &ReflectionRecord) -> Ordering {
    a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id))
}

//! Cycle-level operational counters, mirroring `backend/src/metrics/counters.rs`:
//! plain `Arc<AtomicU64>` fields, cheap to clone and share, read out as
//! `tracing` span fields rather than exported to a metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Counters {
    pub cycles: Arc<AtomicU64>,
    pub intents_emitted: Arc<AtomicU64>,
    pub intents_filled: Arc<AtomicU64>,
    pub intents_failed: Arc<AtomicU64>,
    pub intents_rejected: Arc<AtomicU64>,
    pub intents_expired: Arc<AtomicU64>,
    pub proposals_emitted: Arc<AtomicU64>,
}

impl Counters {
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            intents_emitted: self.intents_emitted.load(Ordering::Relaxed),
            intents_filled: self.intents_filled.load(Ordering::Relaxed),
            intents_failed: self.intents_failed.load(Ordering::Relaxed),
            intents_rejected: self.intents_rejected.load(Ordering::Relaxed),
            intents_expired: self.intents_expired.load(Ordering::Relaxed),
            proposals_emitted: self.proposals_emitted.load(Ordering::Relaxed),
        }
    }
}

fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Counters {
    pub fn record_cycle(&self) {
        inc(&self.cycles);
    }

    pub fn record_intent_outcome(&self, status: types::ResultStatus) {
        inc(&self.intents_emitted);
        match status {
            types::ResultStatus::Filled => inc(&self.intents_filled),
            types::ResultStatus::Failed => inc(&self.intents_failed),
            types::ResultStatus::Rejected => inc(&self.intents_rejected),
            types::ResultStatus::Expired => inc(&self.intents_expired),
        }
    }

    pub fn record_proposal(&self) {
        inc(&self.proposals_emitted);
    }
}

/// Plain-value snapshot for logging (an `Arc<AtomicU64>` isn't `Display`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CountersSnapshot {
    pub cycles: u64,
    pub intents_emitted: u64,
    pub intents_filled: u64,
    pub intents_failed: u64,
    pub intents_rejected: u64,
    pub intents_expired: u64,
    pub proposals_emitted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_intent_outcome_routes_to_the_right_bucket() {
        let counters = Counters::default();
        counters.record_intent_outcome(types::ResultStatus::Filled);
        counters.record_intent_outcome(types::ResultStatus::Rejected);
        let snap = counters.snapshot();
        assert_eq!(snap.intents_emitted, 2);
        assert_eq!(snap.intents_filled, 1);
        assert_eq!(snap.intents_rejected, 1);
    }

    #[test]
    fn clones_share_the_same_underlying_counters() {
        let counters = Counters::default();
        let clone = counters.clone();
        counters.record_cycle();
        assert_eq!(clone.snapshot().cycles, 1);
    }
}

//! Saga log for canonical-entity creations.

use bindery_core::CanonicalEntityId;
use serde::{Deserialize, Serialize};

/// Ordered log of canonical entities created during one workflow run.
///
/// The ENRICHED stage threads this through its activities; on failure the
/// compensating activity deletes exactly these ids in reverse order.
/// Rollback is idempotent: deleting an already-absent id is a no-op, so a
/// partially-completed rollback can be retried from the top.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SagaLog {
    created: Vec<CanonicalEntityId>,
}

impl SagaLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { created: Vec::new() }
    }

    /// Records a created entity.
    pub fn record(&mut self, id: CanonicalEntityId) {
        self.created.push(id);
    }

    /// Whether anything was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Created ids in creation order.
    #[must_use]
    pub fn created_ids(&self) -> Vec<CanonicalEntityId> {
        self.created.clone()
    }

    /// Ids in the order rollback must delete them (reverse of creation).
    #[must_use]
    pub fn rollback_order(&self) -> Vec<CanonicalEntityId> {
        let mut ids = self.created.clone();
        ids.reverse();
        ids
    }

    /// Merges another log (later creations) into this one.
    pub fn extend(&mut self, other: Self) {
        self.created.extend(other.created);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_order_is_reverse_of_creation() {
        let mut log = SagaLog::new();
        let a = CanonicalEntityId::generate();
        let b = CanonicalEntityId::generate();
        log.record(a);
        log.record(b);
        assert_eq!(log.created_ids(), vec![a, b]);
        assert_eq!(log.rollback_order(), vec![b, a]);
    }

    #[test]
    fn log_round_trips_through_serde() {
        let mut log = SagaLog::new();
        log.record(CanonicalEntityId::generate());
        let json = serde_json::to_string(&log).unwrap();
        let back: SagaLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.created_ids(), log.created_ids());
    }
}

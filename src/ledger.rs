use std::collections::HashSet;

use crate::types::EventId;

/// Append-only set of fill identities observed during this process lifetime.
///
/// Nothing is ever evicted and nothing is persisted: a restart forgets all
/// history, so fills still inside the poll window are announced again.
///
/// Mutation needs `&mut self`, so the single owner (the coordinator task) is
/// the only writer and a check followed by an insert can never interleave with
/// another check of the same id.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<EventId>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &EventId) -> bool {
        self.seen.contains(id)
    }

    pub fn add(&mut self, id: EventId) {
        self.seen.insert(id);
    }

    /// Returns `true` when `id` was not seen before; it is recorded either way.
    pub fn check_and_insert(&mut self, id: EventId) -> bool {
        self.seen.insert(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn add_then_has() {
        let mut ledger = DedupLedger::new();
        let id = EventId::new("BTC", 1_000, Side::Buy, 0.5);
        assert!(!ledger.has(&id));
        ledger.add(id.clone());
        assert!(ledger.has(&id));
        ledger.add(id);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn check_and_insert_is_true_once() {
        let mut ledger = DedupLedger::new();
        let id = EventId::new("ETH", 2_000, Side::Sell, 2.0);
        assert!(ledger.check_and_insert(id.clone()));
        assert!(!ledger.check_and_insert(id.clone()));
        assert!(!ledger.check_and_insert(id));
        assert_eq!(ledger.len(), 1);
    }
}

// Copyright (c) 2022 The zchain developers

use parking_lot::RwLock;
use std::collections::BTreeMap;
use zchain_models::Round;

#[derive(Default)]
struct RoundTableRaw {
    rounds: BTreeMap<u64, Round>,
    current_round: u64,
}

/// Rounds by number, created on first reference
#[derive(Default)]
pub(crate) struct RoundTable {
    inner: RwLock<RoundTableRaw>,
}

impl RoundTable {
    /// Create the round if missing, returns true if it was created
    pub fn add_round(&self, number: u64) -> bool {
        let mut raw = self.inner.write();
        if raw.rounds.contains_key(&number) {
            return false;
        }
        raw.rounds.insert(number, Round::new(number));
        true
    }

    pub fn get_round(&self, number: u64) -> Option<Round> {
        self.inner.read().rounds.get(&number).cloned()
    }

    /// Mutate a round, creating it if needed
    pub fn with_round<R>(&self, number: u64, f: impl FnOnce(&mut Round) -> R) -> R {
        let mut raw = self.inner.write();
        f(raw.rounds.entry(number).or_insert_with(|| Round::new(number)))
    }

    pub fn delete_round(&self, number: u64) -> Option<Round> {
        self.inner.write().rounds.remove(&number)
    }

    /// Drop the rounds below `number`, except round 0
    pub fn delete_below(&self, number: u64) -> usize {
        let mut raw = self.inner.write();
        let before = raw.rounds.len();
        raw.rounds.retain(|r, _| *r == 0 || *r >= number);
        before - raw.rounds.len()
    }

    /// Set the seed of a round and compute its miner ranks. Advances the
    /// current round when the seed is new. Returns false if nothing changed.
    pub fn set_random_seed(&self, number: u64, seed: u64, miners_count: usize) -> bool {
        let mut raw = self.inner.write();
        let updated = raw
            .rounds
            .entry(number)
            .or_insert_with(|| Round::new(number))
            .set_random_seed(seed, miners_count);
        if updated && number > raw.current_round {
            raw.current_round = number;
        }
        updated
    }

    pub fn current_round(&self) -> u64 {
        self.inner.read().current_round
    }

    /// Move the current round forward, never back
    pub fn set_current_round(&self, number: u64) -> bool {
        let mut raw = self.inner.write();
        if number <= raw.current_round {
            return false;
        }
        raw.current_round = number;
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().rounds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_random_seed_idempotent() {
        let table = RoundTable::default();
        assert!(table.set_random_seed(3, 42, 5));
        assert_eq!(table.current_round(), 3);
        assert!(!table.set_random_seed(3, 42, 5));
        assert_eq!(table.get_round(3).unwrap().random_seed(), Some(42));
        assert!(table.get_round(3).unwrap().miner_rank(0).is_some());

        // seeding an older round does not move the current round back
        assert!(table.set_random_seed(2, 7, 5));
        assert_eq!(table.current_round(), 3);
        assert!(!table.set_current_round(1));
    }

    #[test]
    fn test_delete_below_keeps_round_zero() {
        let table = RoundTable::default();
        for r in 0..20 {
            table.add_round(r);
        }
        assert!(!table.add_round(5));
        assert_eq!(table.delete_below(10), 9);
        assert!(table.get_round(0).is_some());
        assert!(table.get_round(9).is_none());
        assert!(table.get_round(10).is_some());
        assert_eq!(table.len(), 11);
        assert!(table.delete_round(10).is_some());
    }
}

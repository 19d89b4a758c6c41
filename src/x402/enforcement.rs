//! Tiered per-payer enforcement: a rolling 7-day failure window gates
//! each payer address into allow / cooldown / hard-block tiers. A
//! successful settlement never clears history.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::timestamp::UnixTimestamp;

const GRACE_COOLDOWN_SECONDS: u64 = 600;
const HARD_BLOCK_THRESHOLD: usize = 10;
const HARD_BLOCK_WINDOW_SECONDS: u64 = 604_800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementTier {
    Allow,
    Cooldown { remaining_seconds: u64 },
    HardBlocked,
}

struct PayerRecord {
    failures: Vec<u64>,
    hard_blocked: bool,
}

/// Process-global enforcement state, one mutex-guarded map keyed by
/// lower-cased payer address.
pub struct EnforcementStore {
    records: Mutex<HashMap<String, PayerRecord>>,
}

impl EnforcementStore {
    pub fn new() -> Self {
        Self { records: Mutex::new(HashMap::new()) }
    }

    pub fn check(&self, payer_address: &str) -> EnforcementTier {
        let addr = payer_address.to_lowercase();
        let now = UnixTimestamp::now().0;
        let mut records = self.records.lock().expect("enforcement mutex poisoned");
        let Some(record) = records.get_mut(&addr) else {
            return EnforcementTier::Allow;
        };

        if record.hard_blocked {
            return EnforcementTier::HardBlocked;
        }

        record.failures.retain(|&t| now.saturating_sub(t) < HARD_BLOCK_WINDOW_SECONDS);

        if record.failures.len() >= HARD_BLOCK_THRESHOLD {
            record.hard_blocked = true;
            return EnforcementTier::HardBlocked;
        }

        if let Some(&last) = record.failures.last() {
            let elapsed = now.saturating_sub(last);
            if elapsed < GRACE_COOLDOWN_SECONDS {
                return EnforcementTier::Cooldown { remaining_seconds: GRACE_COOLDOWN_SECONDS - elapsed };
            }
        }

        EnforcementTier::Allow
    }

    pub fn record_failure(&self, payer_address: &str) {
        let addr = payer_address.to_lowercase();
        let now = UnixTimestamp::now().0;
        let mut records = self.records.lock().expect("enforcement mutex poisoned");
        records.entry(addr).or_insert_with(|| PayerRecord { failures: Vec::new(), hard_blocked: false }).failures.push(now);
    }

    /// A success is intentionally a no-op: history is never cleared by a
    /// single good payment.
    pub fn record_success(&self, _payer_address: &str) {}
}

impl Default for EnforcementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_address_is_allowed() {
        let store = EnforcementStore::new();
        assert_eq!(store.check("0xabc"), EnforcementTier::Allow);
    }

    #[test]
    fn single_failure_triggers_cooldown() {
        let store = EnforcementStore::new();
        store.record_failure("0xABC");
        match store.check("0xabc") {
            EnforcementTier::Cooldown { remaining_seconds } => assert!(remaining_seconds <= 600),
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[test]
    fn ten_failures_hard_blocks() {
        let store = EnforcementStore::new();
        for _ in 0..10 {
            store.record_failure("0xdead");
        }
        assert_eq!(store.check("0xdead"), EnforcementTier::HardBlocked);
    }

    #[test]
    fn success_does_not_clear_history() {
        let store = EnforcementStore::new();
        for _ in 0..9 {
            store.record_failure("0xbeef");
        }
        store.record_success("0xbeef");
        store.record_failure("0xbeef");
        assert_eq!(store.check("0xbeef"), EnforcementTier::HardBlocked);
    }
}

//! A local single-use cache over the EIP-3009 authorization nonce.
//!
//! Settlement double-spend protection is delegated to the chain itself;
//! this store only guards against the proxy issuing duplicate verify/settle
//! calls for a retried `X-PAYMENT` header within the same process, which
//! would otherwise waste a facilitator round trip. Entries expire after
//! five minutes and are pruned lazily on insert.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::timestamp::UnixTimestamp;

const NONCE_TTL_SECONDS: u64 = 300;

pub struct PaymentNonceStore {
    seen: Mutex<HashMap<String, u64>>,
}

impl PaymentNonceStore {
    pub fn new() -> Self {
        Self { seen: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if this is the first time `nonce` has been seen
    /// (and records it); `false` if it was already consumed and still
    /// within its TTL.
    pub fn try_consume(&self, nonce: &str) -> bool {
        let now = UnixTimestamp::now().0;
        let mut seen = self.seen.lock().expect("nonce store mutex poisoned");
        seen.retain(|_, &mut issued_at| now.saturating_sub(issued_at) < NONCE_TTL_SECONDS);

        if seen.contains_key(nonce) {
            false
        } else {
            seen.insert(nonce.to_string(), now);
            true
        }
    }
}

impl Default for PaymentNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_succeeds_second_use_is_rejected() {
        let store = PaymentNonceStore::new();
        assert!(store.try_consume("abc"));
        assert!(!store.try_consume("abc"));
    }

    #[test]
    fn distinct_nonces_are_independent() {
        let store = PaymentNonceStore::new();
        assert!(store.try_consume("one"));
        assert!(store.try_consume("two"));
    }
}

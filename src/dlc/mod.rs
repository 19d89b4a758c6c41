//! The DLC (Discreet Log Contract) sub-oracle: hourly Schnorr nonce
//! announcements and price attestations for BTCUSD, serving the same
//! consumers the rest of this crate serves over HTTP instead of Lightning
//! or x402 — a publicly verifiable oracle rather than a payment-gated one.

pub mod schnorr;
pub mod scheduler;
pub mod server;
pub mod store;

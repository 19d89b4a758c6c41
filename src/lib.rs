//! Sovereign Oracle: a payment-gated price attestation service.
//!
//! Aggregates price observations across independent sources into a
//! cryptographically signed canonical statement, then gates delivery of that
//! statement behind either an L402 (Lightning HTTP 402) or an x402 (USDC
//! HTTP 402) payment rail. A companion DLC sub-oracle pre-commits Schnorr
//! nonces for upcoming settlement hours and later publishes per-digit
//! attestations against the same price feed.

pub mod canonical;
pub mod config;
pub mod error;
pub mod pair;
pub mod signing;
pub mod sig_down;
pub mod state;
pub mod timestamp;

pub mod sources;
pub mod aggregator;
pub mod attestation;

pub mod l402;
pub mod x402;
pub mod dlc;
pub mod telemetry;

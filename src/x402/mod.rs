//! x402 (USDC HTTP 402) payment rail: PaymentRequirements construction,
//! CDP facilitator verify+settle, tiered enforcement, the USDC depeg
//! circuit breaker, and the payment-gated proxy in front of the
//! attestation server.

pub mod depeg;
pub mod enforcement;
pub mod facilitator;
pub mod jwt;
pub mod nonce;
pub mod proxy;
pub mod types;

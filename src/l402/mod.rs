//! L402 (Lightning HTTP 402) payment rail: invoice minting, macaroon bearer
//! credentials, and the payment-gated proxy in front of the attestation
//! server.

pub mod lightning;
pub mod macaroon;
pub mod proxy;

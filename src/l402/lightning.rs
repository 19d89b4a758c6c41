//! A trait-based seam over the Lightning node's invoice API, so the L402
//! proxy's state machine can be tested without a live node.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LightningError {
    #[error("invoice creation request failed: {0}")]
    Request(String),
    #[error("malformed response from lightning node: {0}")]
    Malformed(String),
}

/// A freshly minted Lightning invoice.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub payment_request: String,
    pub payment_hash: [u8; 32],
}

#[async_trait]
pub trait LightningBackend: Send + Sync {
    async fn create_invoice(&self, amount_sats: u64, memo: &str) -> Result<Invoice, LightningError>;
}

/// Talks to an LND-compatible node over its REST API.
pub struct LndRestBackend {
    client: reqwest::Client,
    base_url: String,
    macaroon_hex: String,
}

impl LndRestBackend {
    pub fn new(base_url: String, macaroon_hex: String, tls_cert_pem: Option<Vec<u8>>) -> Result<Self, LightningError> {
        let mut builder = reqwest::Client::builder();
        if let Some(pem) = tls_cert_pem {
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| LightningError::Malformed(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| LightningError::Request(e.to_string()))?;
        Ok(Self { client, base_url, macaroon_hex })
    }
}

#[derive(Debug, Deserialize)]
struct LndInvoiceResponse {
    payment_request: String,
    r_hash: String,
}

#[async_trait]
impl LightningBackend for LndRestBackend {
    async fn create_invoice(&self, amount_sats: u64, memo: &str) -> Result<Invoice, LightningError> {
        let url = format!("{}/v1/invoices", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Grpc-Metadata-macaroon", &self.macaroon_hex)
            .json(&serde_json::json!({ "value": amount_sats.to_string(), "memo": memo }))
            .send()
            .await
            .map_err(|e| LightningError::Request(e.to_string()))?;

        let body: LndInvoiceResponse = resp
            .json()
            .await
            .map_err(|e| LightningError::Malformed(e.to_string()))?;

        let r_hash_bytes = base64::engine::general_purpose::STANDARD
            .decode(&body.r_hash)
            .map_err(|e| LightningError::Malformed(e.to_string()))?;
        let payment_hash: [u8; 32] = r_hash_bytes
            .try_into()
            .map_err(|_| LightningError::Malformed("r_hash was not 32 bytes".to_string()))?;

        Ok(Invoice { payment_request: body.payment_request, payment_hash })
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A deterministic in-memory backend for proxy state-machine tests.
    pub struct FakeLightningBackend {
        counter: AtomicU64,
    }

    impl FakeLightningBackend {
        pub fn new() -> Self {
            Self { counter: AtomicU64::new(0) }
        }
    }

    #[async_trait]
    impl LightningBackend for FakeLightningBackend {
        async fn create_invoice(&self, amount_sats: u64, memo: &str) -> Result<Invoice, LightningError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let preimage = format!("preimage-{n}-{amount_sats}-{memo}");
            let payment_hash: [u8; 32] = Sha256::digest(preimage.as_bytes()).into();
            Ok(Invoice {
                payment_request: format!("lnbc-fake-{n}"),
                payment_hash,
            })
        }
    }
}

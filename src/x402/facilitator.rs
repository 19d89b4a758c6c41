//! HTTP client for the CDP x402 facilitator's `/verify` and `/settle`
//! endpoints.

use thiserror::Error;

use super::jwt::CdpSigner;
use super::types::{FacilitatorRequest, SettleResponse, VerifyResponse};

#[derive(Debug, Error)]
pub enum FacilitatorError {
    #[error("facilitator request failed: {0}")]
    Request(String),
    #[error("facilitator returned non-200 status {status}: {body}")]
    BadStatus { status: u16, body: String },
}

pub struct FacilitatorClient {
    client: reqwest::Client,
    base_url: String,
    signer: CdpSigner,
    host: String,
}

impl FacilitatorClient {
    pub fn new(client: reqwest::Client, base_url: String, signer: CdpSigner) -> Self {
        let host = base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or("api.cdp.coinbase.com")
            .to_string();
        Self { client, base_url, signer, host }
    }

    pub async fn verify(&self, request: &FacilitatorRequest) -> Result<VerifyResponse, FacilitatorError> {
        let jwt = self.signer.mint(&self.host, "/platform/v2/x402/verify");
        self.post("/verify", request, &jwt).await
    }

    pub async fn settle(&self, request: &FacilitatorRequest) -> Result<SettleResponse, FacilitatorError> {
        let jwt = self.signer.mint(&self.host, "/platform/v2/x402/settle");
        self.post("/settle", request, &jwt).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &FacilitatorRequest,
        jwt: &str,
    ) -> Result<T, FacilitatorError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(jwt)
            .json(body)
            .send()
            .await
            .map_err(|e| FacilitatorError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(FacilitatorError::BadStatus { status: status.as_u16(), body: body_text });
        }

        resp.json::<T>().await.map_err(|e| FacilitatorError::Request(e.to_string()))
    }
}

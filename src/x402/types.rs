//! Wire types for the x402 HTTP 402 handshake: the payment requirements
//! the proxy returns in a 402 challenge, the payment payload a client
//! resubmits in `X-PAYMENT`, and the CDP facilitator's verify/settle
//! request and response bodies.

use serde::{Deserialize, Serialize};

pub const X402_VERSION: u32 = 1;
pub const X402_SCHEME: &str = "exact";
pub const USDC_DECIMALS: u32 = 6;

/// One accepted way to pay for a route: scheme, network, asset, amount,
/// and recipient, serialized verbatim into the 402 response body and the
/// `PAYMENT-REQUIRED` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "payTo")]
    pub pay_to: String,
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u64,
    pub asset: String,
    pub extra: PaymentRequirementsExtra,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirementsExtra {
    pub name: String,
    pub version: String,
}

impl PaymentRequirements {
    /// Build requirements for a route priced at `amount_usd` dollars,
    /// asking for payment in USDC on `network` to `pay_to`.
    pub fn build(
        resource: String,
        description: String,
        amount_usd: f64,
        network: &str,
        usdc_contract: &str,
        pay_to: &str,
    ) -> Self {
        let atomic = (amount_usd * 10f64.powi(USDC_DECIMALS as i32)).round() as u64;
        Self {
            scheme: X402_SCHEME.to_string(),
            network: network.to_string(),
            max_amount_required: atomic.to_string(),
            resource,
            description,
            mime_type: "application/json".to_string(),
            pay_to: pay_to.to_string(),
            max_timeout_seconds: 60,
            asset: usdc_contract.to_string(),
            extra: PaymentRequirementsExtra { name: "USD Coin".to_string(), version: "2".to_string() },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct X402Body {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The decoded `X-PAYMENT` header: an EIP-3009 `transferWithAuthorization`
/// wrapped in the x402 envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentPayload {
    #[serde(rename = "x402Version", default = "default_x402_version")]
    pub x402_version: u32,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub network: String,
    pub payload: ExactEvmPayload,
}

fn default_x402_version() -> u32 {
    X402_VERSION
}

fn default_scheme() -> String {
    X402_SCHEME.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExactEvmPayload {
    pub authorization: Eip3009Authorization,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Eip3009Authorization {
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(rename = "validAfter")]
    pub valid_after: String,
    #[serde(rename = "validBefore")]
    pub valid_before: String,
    pub nonce: String,
}

/// Body sent to the facilitator's `/verify` and `/settle` endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct FacilitatorRequest {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    #[serde(rename = "paymentPayload")]
    pub payment_payload: PaymentPayload,
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    #[serde(rename = "invalidReason")]
    pub invalid_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettleResponse {
    pub success: bool,
    #[serde(rename = "errorReason")]
    pub error_reason: Option<String>,
    pub transaction: Option<String>,
    pub network: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_computes_atomic_amount_at_six_decimals() {
        let req = PaymentRequirements::build(
            "https://example.com/oracle/btcusd".to_string(),
            "BTC/USD spot".to_string(),
            0.001,
            "eip155:8453",
            "0xUSDC",
            "0xPAYEE",
        );
        assert_eq!(req.max_amount_required, "1000");
        assert_eq!(req.extra.name, "USD Coin");
    }
}

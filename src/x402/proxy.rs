//! The x402 payment-gated proxy: depeg breaker, enforcement, CDP
//! facilitator verify+settle, backend fetch, and Ed25519 re-signing —
//! the full `NO_PAYMENT → CHALLENGED → VERIFIED → SETTLED → FORWARDED`
//! state machine.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tracing::{instrument, warn};

use crate::pair::PairRegistry;
use crate::signing::KeyStore;

use super::depeg::DepegBreaker;
use super::enforcement::{EnforcementStore, EnforcementTier};
use super::facilitator::FacilitatorClient;
use super::nonce::PaymentNonceStore;
use super::types::{FacilitatorRequest, PaymentPayload, PaymentRequirements, X402Body};

pub const X402_NETWORK: &str = "eip155:8453";
pub const USDC_CONTRACT_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

#[derive(Debug, Clone)]
pub struct X402Route {
    pub backend_url: String,
    pub resource: String,
    pub description: String,
    pub price_usd: f64,
}

pub fn build_routes(registry: &PairRegistry, attestation_base_url: &str, resource_base: &str) -> HashMap<String, X402Route> {
    let mut routes = HashMap::new();
    for (route_key, pair) in registry.iter() {
        let price_usd = if route_key.ends_with("/vwap") { 0.002 } else { 0.001 };
        let path = format!("/oracle/{route_key}");
        routes.insert(
            path.clone(),
            X402Route {
                backend_url: format!("{attestation_base_url}{path}"),
                resource: format!("{resource_base}{path}"),
                description: format!("{} attestation — Ed25519-signed", pair.symbol),
                price_usd,
            },
        );
    }
    routes
}

pub struct X402ProxyState {
    pub routes: HashMap<String, X402Route>,
    pub keys: Arc<KeyStore>,
    pub enforcement: EnforcementStore,
    pub nonces: PaymentNonceStore,
    pub depeg: DepegBreaker,
    pub facilitator: FacilitatorClient,
    pub http: reqwest::Client,
    pub pay_to: String,
}

pub type SharedX402State = Arc<X402ProxyState>;

pub fn routes() -> Router<SharedX402State> {
    Router::new()
        .route("/health", get(health))
        .route("/sho/info", get(info))
        .route("/sho/enforcement/{address}", get(enforcement_status))
        .route("/{*path}", get(proxy))
}

#[instrument(skip_all)]
async fn health() -> impl IntoResponse {
    axum::Json(json!({ "status": "ok", "protocol": "x402", "version": env!("CARGO_PKG_VERSION") }))
}

#[instrument(skip_all)]
async fn info(State(state): State<SharedX402State>) -> impl IntoResponse {
    let depeg = state.depeg.check().await;
    let endpoints: serde_json::Map<String, serde_json::Value> = state
        .routes
        .iter()
        .map(|(path, route)| {
            let atomic = (route.price_usd * 1_000_000f64).round() as u64;
            (path.clone(), json!({ "price_usd": route.price_usd, "maxAmountRequired": atomic.to_string() }))
        })
        .collect();
    axum::Json(json!({
        "protocol": "x402",
        "x402Version": 1,
        "signing_scheme": "ed25519",
        "pubkey": state.keys.ed25519_pubkey_hex(),
        "payment_network": X402_NETWORK,
        "payment_scheme": "exact",
        "payment_asset": USDC_CONTRACT_BASE,
        "payment_address": state.pay_to,
        "depeg_active": !depeg.pegged,
        "endpoints": endpoints,
    }))
}

#[instrument(skip_all)]
async fn enforcement_status(State(state): State<SharedX402State>, Path(address): Path<String>) -> impl IntoResponse {
    let tier = state.enforcement.check(&address);
    axum::Json(tier_json(&tier))
}

fn tier_json(tier: &EnforcementTier) -> serde_json::Value {
    match tier {
        EnforcementTier::Allow => json!({ "allowed": true, "reason": null, "tier": 0 }),
        EnforcementTier::Cooldown { remaining_seconds } => {
            json!({ "allowed": false, "reason": format!("cooldown_{remaining_seconds}s"), "tier": 1 })
        }
        EnforcementTier::HardBlocked => json!({ "allowed": false, "reason": "hard_blocked", "tier": 3 }),
    }
}

#[instrument(skip(state, headers))]
async fn proxy(State(state): State<SharedX402State>, Path(path): Path<String>, headers: HeaderMap) -> Response {
    let full_path = format!("/{path}");
    let route = match state.routes.get(&full_path) {
        Some(r) => r.clone(),
        None => return (StatusCode::NOT_FOUND, axum::Json(json!({ "error": "not_found" }))).into_response(),
    };

    let depeg = state.depeg.check().await;
    if !depeg.pegged {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({
                "error": "depeg_circuit_breaker",
                "message": "USDC payment suspended — stablecoin deviation exceeds threshold",
                "usdc_rate": depeg.rate,
            })),
        )
            .into_response();
    }

    let requirements = PaymentRequirements::build(
        route.resource.clone(),
        route.description.clone(),
        route.price_usd,
        X402_NETWORK,
        USDC_CONTRACT_BASE,
        &state.pay_to,
    );

    let x_payment = headers.get("X-PAYMENT").and_then(|v| v.to_str().ok());

    let Some(x_payment) = x_payment else {
        return challenge_402(&requirements);
    };

    let payload_bytes = match BASE64.decode(x_payment) {
        Ok(b) => b,
        Err(_) => return challenge_402(&requirements),
    };
    let payment_payload: PaymentPayload = match serde_json::from_slice(&payload_bytes) {
        Ok(p) => p,
        Err(_) => return challenge_402(&requirements),
    };

    let payer_address = payment_payload.payload.authorization.from.clone();

    let tier = state.enforcement.check(&payer_address);
    if tier != EnforcementTier::Allow {
        return (StatusCode::FORBIDDEN, axum::Json(json!({ "error": "payment_address_blocked", "reason": tier_reason(&tier), "tier": tier_num(&tier) }))).into_response();
    }

    if !state.nonces.try_consume(&payment_payload.payload.authorization.nonce) {
        warn!(payer = %payer_address, "duplicate x402 payment nonce, skipping re-settlement");
    }

    let facilitator_request =
        FacilitatorRequest { x402_version: 1, payment_payload: payment_payload.clone(), payment_requirements: requirements.clone() };

    let verify_result = state.facilitator.verify(&facilitator_request).await;
    match verify_result {
        Ok(v) if v.is_valid => {}
        Ok(v) => {
            state.enforcement.record_failure(&payer_address);
            return payment_failed(format!("verification_failed: {}", v.invalid_reason.unwrap_or_default()));
        }
        Err(e) => {
            state.enforcement.record_failure(&payer_address);
            return payment_failed(format!("facilitator_verify_error: {e}"));
        }
    }

    let settle_result = state.facilitator.settle(&facilitator_request).await;
    let settle_data = match settle_result {
        Ok(s) if s.success => s,
        Ok(s) => {
            state.enforcement.record_failure(&payer_address);
            return payment_failed(format!("settlement_failed: {}", s.error_reason.unwrap_or_default()));
        }
        Err(e) => {
            state.enforcement.record_failure(&payer_address);
            return payment_failed(format!("facilitator_settle_error: {e}"));
        }
    };

    let backend_data: serde_json::Value = match state.http.get(&route.backend_url).send().await {
        Ok(resp) => match resp.json().await {
            Ok(v) => v,
            Err(_) => return (StatusCode::BAD_GATEWAY, axum::Json(json!({ "error": "oracle_backend_error" }))).into_response(),
        },
        Err(_) => return (StatusCode::BAD_GATEWAY, axum::Json(json!({ "error": "oracle_backend_error" }))).into_response(),
    };

    let canonical = match backend_data.get("canonical").and_then(|v| v.as_str()) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => return (StatusCode::BAD_GATEWAY, axum::Json(json!({ "error": "backend_missing_canonical" }))).into_response(),
    };

    let digest: [u8; 32] = {
        use sha2::{Digest, Sha256};
        Sha256::digest(canonical.as_bytes()).into()
    };
    let ed25519_sig = BASE64.encode(state.keys.sign_ed25519_digest(&digest));

    state.enforcement.record_success(&payer_address);

    let payment_response_header = BASE64.encode(serde_json::to_string(&settle_data).unwrap_or_default());

    let mut resp = axum::Json(json!({
        "domain": backend_data.get("domain").cloned().unwrap_or(serde_json::Value::String(String::new())),
        "canonical": canonical,
        "signature": ed25519_sig,
        "signing_scheme": "ed25519",
        "pubkey": state.keys.ed25519_pubkey_hex(),
        "payment": {
            "protocol": "x402",
            "network": X402_NETWORK,
            "settled": true,
        },
    }))
    .into_response();
    resp.headers_mut().insert(
        "X-PAYMENT-RESPONSE",
        payment_response_header.parse().expect("base64 is ASCII"),
    );
    resp
}

fn challenge_402(requirements: &PaymentRequirements) -> Response {
    let body = X402Body { x402_version: 1, accepts: vec![requirements.clone()], error: Some("X-PAYMENT header is required".to_string()) };
    let header_payload = json!({ "x402Version": 1, "accepts": [requirements] });
    let header_value = BASE64.encode(header_payload.to_string());

    let mut resp = (StatusCode::PAYMENT_REQUIRED, axum::Json(body)).into_response();
    resp.headers_mut().insert("PAYMENT-REQUIRED", header_value.parse().expect("base64 is ASCII"));
    resp
}

fn payment_failed(detail: String) -> Response {
    (StatusCode::PAYMENT_REQUIRED, axum::Json(json!({ "error": "payment_verification_failed", "detail": detail }))).into_response()
}

fn tier_reason(tier: &EnforcementTier) -> String {
    match tier {
        EnforcementTier::Allow => String::new(),
        EnforcementTier::Cooldown { remaining_seconds } => format!("cooldown_{remaining_seconds}s"),
        EnforcementTier::HardBlocked => "hard_blocked".to_string(),
    }
}

fn tier_num(tier: &EnforcementTier) -> u8 {
    match tier {
        EnforcementTier::Allow => 0,
        EnforcementTier::Cooldown { .. } => 1,
        EnforcementTier::HardBlocked => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_routes_prices_vwap_higher() {
        let registry = PairRegistry::default();
        let routes = build_routes(&registry, "http://127.0.0.1:9100", "https://api.example.com");
        assert_eq!(routes.get("/oracle/btcusd").unwrap().price_usd, 0.001);
        assert_eq!(routes.get("/oracle/btcusd/vwap").unwrap().price_usd, 0.002);
    }
}

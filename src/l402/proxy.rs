//! Component 4.E: the L402 payment-gated proxy. Each route mints a
//! Lightning invoice and a bound macaroon on first request, then forwards
//! to the backend attestation server once the caller presents a valid
//! `macaroon:preimage` credential.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};

use crate::pair::PairRegistry;

use super::lightning::LightningBackend;
use super::macaroon::Macaroon;

/// One payment-gated route: which attestation-server path it proxies to,
/// and its price in satoshis.
#[derive(Debug, Clone)]
pub struct L402Route {
    pub backend_url: String,
    pub price_sats: u64,
}

/// Build the route table from the pair registry: one route per servable
/// pair, priced at 10 sats (20 for VWAP).
pub fn build_routes(registry: &PairRegistry, attestation_base_url: &str) -> HashMap<String, L402Route> {
    let mut routes = HashMap::new();
    for (route_key, _) in registry.iter() {
        let price_sats = if route_key.ends_with("/vwap") { 20 } else { 10 };
        let path = format!("/oracle/{route_key}");
        routes.insert(
            path.clone(),
            L402Route { backend_url: format!("{attestation_base_url}{path}"), price_sats },
        );
    }
    routes
}

pub struct L402ProxyState {
    pub routes: HashMap<String, L402Route>,
    pub lightning: Arc<dyn LightningBackend>,
    pub macaroon_secret: Vec<u8>,
    pub location: String,
    pub http: reqwest::Client,
    pub attestation_base_url: String,
}

pub type SharedL402State = Arc<L402ProxyState>;

pub fn routes() -> Router<SharedL402State> {
    Router::new()
        .route("/health", get(passthrough_health))
        .route("/oracle/status", get(passthrough_status))
        .route("/{*path}", get(proxy))
}

#[instrument(skip_all)]
async fn passthrough_health(State(state): State<SharedL402State>) -> Response {
    forward(&state.http, &format!("{}/health", state.attestation_base_url)).await
}

#[instrument(skip_all)]
async fn passthrough_status(State(state): State<SharedL402State>) -> Response {
    forward(&state.http, &format!("{}/oracle/status", state.attestation_base_url)).await
}

async fn forward(client: &reqwest::Client, url: &str) -> Response {
    match client.get(url).send().await {
        Ok(resp) => {
            let status = resp.status();
            match resp.json::<serde_json::Value>().await {
                Ok(body) => (status, axum::Json(body)).into_response(),
                Err(_) => StatusCode::BAD_GATEWAY.into_response(),
            }
        }
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

#[instrument(skip(state, headers))]
async fn proxy(
    State(state): State<SharedL402State>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let full_path = format!("/{path}");
    let route = match state.routes.get(&full_path) {
        Some(r) => r.clone(),
        None => return (StatusCode::NOT_FOUND, axum::Json(json!({ "error": "not found" }))).into_response(),
    };

    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("L402 ").or_else(|| auth.strip_prefix("LSAT ")) {
            return handle_authenticated(&state, &route, token).await;
        }
    }

    mint_challenge(&state, &route, &full_path).await
}

async fn handle_authenticated(state: &L402ProxyState, route: &L402Route, token: &str) -> Response {
    let Some((macaroon_hex, preimage_hex)) = token.split_once(':') else {
        return unauthorized();
    };

    let Ok(macaroon) = Macaroon::from_hex(&state.location, macaroon_hex) else {
        return unauthorized();
    };
    let Ok(preimage) = hex::decode(preimage_hex) else {
        return unauthorized();
    };

    let actual_hash: [u8; 32] = Sha256::digest(&preimage).into();
    if actual_hash != macaroon.identifier {
        warn!("preimage does not hash to macaroon identifier");
        return unauthorized();
    }
    if macaroon.verify(&state.macaroon_secret).is_err() {
        warn!("macaroon signature verification failed");
        return unauthorized();
    }

    forward(&state.http, &route.backend_url).await
}

async fn mint_challenge(state: &L402ProxyState, route: &L402Route, full_path: &str) -> Response {
    let memo = format!("L402 {full_path}");
    match state.lightning.create_invoice(route.price_sats, &memo).await {
        Ok(invoice) => {
            let macaroon = Macaroon::mint(&state.macaroon_secret, &state.location, invoice.payment_hash);
            let header_value = format!(
                "L402 macaroon=\"{}\", invoice=\"{}\"",
                macaroon.to_hex(),
                invoice.payment_request
            );
            let mut resp = (StatusCode::PAYMENT_REQUIRED, "Payment Required").into_response();
            resp.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                header_value.parse().expect("header value is ASCII"),
            );
            resp
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({ "error": format!("invoice creation failed: {e}") })),
        )
            .into_response(),
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": "invalid token" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::lightning::fake::FakeLightningBackend;

    fn test_state() -> SharedL402State {
        let mut routes = HashMap::new();
        routes.insert(
            "/oracle/btcusd".to_string(),
            L402Route { backend_url: "http://127.0.0.1:9100/oracle/btcusd".to_string(), price_sats: 10 },
        );
        Arc::new(L402ProxyState {
            routes,
            lightning: Arc::new(FakeLightningBackend::new()),
            macaroon_secret: b"test-secret".to_vec(),
            location: "sovereign-oracle".to_string(),
            http: reqwest::Client::new(),
            attestation_base_url: "http://127.0.0.1:9100".to_string(),
        })
    }

    #[tokio::test]
    async fn mint_challenge_produces_valid_macaroon_for_its_own_invoice() {
        let state = test_state();
        let route = state.routes.get("/oracle/btcusd").unwrap().clone();
        let invoice = state.lightning.create_invoice(route.price_sats, "test").await.unwrap();
        let macaroon = Macaroon::mint(&state.macaroon_secret, &state.location, invoice.payment_hash);
        assert!(macaroon.verify(&state.macaroon_secret).is_ok());
    }

    #[tokio::test]
    async fn handle_authenticated_rejects_mismatched_preimage() {
        let state = test_state();
        let route = state.routes.get("/oracle/btcusd").unwrap().clone();
        let macaroon = Macaroon::mint(&state.macaroon_secret, &state.location, [9u8; 32]);
        let token = format!("{}:{}", macaroon.to_hex(), hex::encode([1u8; 32]));
        let resp = handle_authenticated(&state, &route, &token).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

//! Component D: the price attestation HTTP endpoint. One route per
//! configured pair, each returning a signed canonical statement; plus
//! `/health`, `/oracle/status`, and `/oracle/cross-certification`.

use axum::Router;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use serde_json::json;
use tracing::instrument;

use crate::canonical::Canonical;
use crate::error::AggregatorError;
use crate::state::SharedOracleState;
use crate::timestamp::UnixTimestamp;

pub fn routes() -> Router<SharedOracleState> {
    Router::new()
        .route("/health", get(health))
        .route("/oracle/status", get(status))
        .route("/oracle/cross-certification", get(cross_certification))
        .route("/oracle/{symbol}", get(attest))
        .route("/oracle/{symbol}/{variant}", get(attest_variant))
}

#[instrument(skip_all)]
async fn health(State(state): State<SharedOracleState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": "v2",
        "pubkey": state.keys.secp256k1_compressed_pubkey_hex(),
        "endpoints": state.aggregator.registry().route_keys(),
    }))
}

#[instrument(skip_all)]
async fn status(State(state): State<SharedOracleState>) -> impl IntoResponse {
    let mut out = serde_json::Map::new();
    for (key, _) in state.aggregator.registry().iter() {
        let entry = match state.aggregator.observe(key).await {
            Ok(obs) => json!({
                "status": "ok",
                "price": obs.price.to_string(),
                "sources": obs.sources,
                "source_count": obs.sources.len(),
                "degraded": obs.degraded,
            }),
            Err(e) => json!({
                "status": "error",
                "error": e.to_string(),
            }),
        };
        out.insert(key.to_string(), entry);
    }
    Json(serde_json::Value::Object(out))
}

#[instrument(skip_all)]
async fn cross_certification(State(state): State<SharedOracleState>) -> axum::response::Response {
    let path = state.config.keys_dir().join("cross_certification.json");
    match state.keys.load_or_create_cross_certification(&path, &state.config.oracle_id) {
        Ok(cert) => Json(cert).into_response(),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(crate::error::ErrorBody::new("CROSS_CERTIFICATION_ERROR", e.to_string())),
        )
            .into_response(),
    }
}

#[instrument(skip(state))]
async fn attest(
    State(state): State<SharedOracleState>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    respond(&state, &symbol).await
}

#[instrument(skip(state))]
async fn attest_variant(
    State(state): State<SharedOracleState>,
    Path((symbol, variant)): Path<(String, String)>,
) -> impl IntoResponse {
    respond(&state, &format!("{symbol}/{variant}")).await
}

async fn respond(state: &SharedOracleState, route_key: &str) -> axum::response::Response {
    let pair = match state.aggregator.registry().get(route_key) {
        Some(p) => p.clone(),
        None => return AggregatorError::UnknownPair(route_key.to_string()).into_response(),
    };

    let observation = match state.aggregator.observe(route_key).await {
        Ok(obs) => obs,
        Err(e) => return e.into_response(),
    };

    let canonical = Canonical {
        symbol: pair.symbol.to_string(),
        price: observation.price,
        quote: pair.quote.to_string(),
        decimals: pair.decimals,
        timestamp: UnixTimestamp::now().to_rfc3339(),
        nonce: pair.nonce.to_string(),
        sources: observation.sources,
        method: pair.method.as_canonical_str().to_string(),
    };

    let digest = canonical.digest();
    let signature = state.keys.sign_secp256k1_digest(&digest);

    Json(json!({
        "domain": pair.symbol,
        "canonical": canonical.build(),
        "signature": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, signature),
        "pubkey": state.keys.secp256k1_compressed_pubkey_hex(),
    }))
    .into_response()
}

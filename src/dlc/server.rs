//! The DLC sub-oracle's five read endpoints: pubkey, announcement
//! listing/lookup, attestation lookup (425 while pending, 404 if the
//! event doesn't exist at all), and aggregate status.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::json;
use tracing::instrument;

use crate::error::DlcError;
use crate::signing::KeyStore;

use super::scheduler::DLC_PAIR;
use super::schnorr::NUM_DIGITS;
use super::store::DlcStore;

pub struct DlcServerState {
    pub store: DlcStore,
    pub keys: Arc<KeyStore>,
}

pub type SharedDlcState = Arc<DlcServerState>;

pub fn routes() -> Router<SharedDlcState> {
    Router::new()
        .route("/health", get(health))
        .route("/dlc/oracle/pubkey", get(pubkey))
        .route("/dlc/oracle/announcements", get(list_announcements))
        .route("/dlc/oracle/announcements/{eid}", get(get_announcement))
        .route("/dlc/oracle/attestations/{eid}", get(get_attestation))
        .route("/dlc/oracle/status", get(status))
}

#[instrument(skip_all)]
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "slo-dlc", "version": "v1" }))
}

#[instrument(skip_all)]
async fn pubkey(State(state): State<SharedDlcState>) -> impl IntoResponse {
    Json(json!({
        "oracle_pubkey": state.keys.secp256k1_compressed_pubkey_hex(),
        "key_format": "compressed",
        "key_bytes": 33,
        "curve": "secp256k1",
    }))
}

#[instrument(skip_all)]
async fn list_announcements(State(state): State<SharedDlcState>) -> impl IntoResponse {
    let event_ids = state.store.list_announced_event_ids();
    let announcements: Vec<_> = event_ids
        .iter()
        .filter_map(|eid| state.store.read_announcement(eid).ok())
        .map(|ann| {
            json!({
                "event_id": ann.event_id,
                "pair": ann.pair,
                "maturity": ann.maturity,
                "num_digits": ann.num_digits,
                "created_at": ann.created_at,
            })
        })
        .collect();
    Json(json!({ "count": announcements.len(), "announcements": announcements }))
}

#[instrument(skip(state))]
async fn get_announcement(State(state): State<SharedDlcState>, Path(eid): Path<String>) -> Response {
    match state.store.read_announcement(&eid) {
        Ok(ann) => Json(ann).into_response(),
        Err(_) => DlcError::AnnouncementNotFound(eid).into_response(),
    }
}

#[instrument(skip(state))]
async fn get_attestation(State(state): State<SharedDlcState>, Path(eid): Path<String>) -> Response {
    if let Some(attestation) = state.store.read_attestation(&eid) {
        return Json(attestation).into_response();
    }
    match state.store.read_announcement(&eid) {
        Ok(_) => DlcError::NotYetAttested(eid).into_response(),
        Err(_) => DlcError::AnnouncementNotFound(eid).into_response(),
    }
}

#[instrument(skip_all)]
async fn status(State(state): State<SharedDlcState>) -> impl IntoResponse {
    let event_ids = state.store.list_announced_event_ids();
    let announcements = event_ids.len();
    let attestations = event_ids.iter().filter(|eid| state.store.has_attestation(eid)).count();
    Json(json!({
        "oracle_pubkey": state.keys.secp256k1_compressed_pubkey_hex(),
        "announcements": announcements,
        "attestations": attestations,
        "pending": announcements - attestations,
        "num_digits": NUM_DIGITS,
        "pairs": [DLC_PAIR],
        "version": "v1",
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use crate::dlc::scheduler::DlcScheduler;
    use crate::dlc::store::DlcStore;
    use std::fs;

    fn temp_state() -> SharedDlcState {
        let dir = std::env::temp_dir().join(format!(
            "sovereign-oracle-dlc-server-test-{:?}",
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let store = DlcStore::new(dir).unwrap();
        let keys_dir = std::env::temp_dir().join(format!(
            "sovereign-oracle-dlc-server-keys-{:?}",
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&keys_dir);
        let keys = Arc::new(KeyStore::load_or_generate(&keys_dir).unwrap());
        Arc::new(DlcServerState { store, keys })
    }

    #[tokio::test]
    async fn missing_announcement_is_404() {
        let state = temp_state();
        let resp = get_announcement(State(state), Path("no-such-event".to_string())).await;
        assert_eq!(resp.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn announced_but_unattested_event_is_425() {
        let state = temp_state();
        let maturity = DlcScheduler::next_hours(1).remove(0);
        let event_id = DlcScheduler::event_id(&maturity);
        let ann = crate::dlc::store::Announcement {
            event_id: event_id.clone(),
            pair: "BTCUSD".to_string(),
            maturity,
            oracle_pubkey: state.keys.secp256k1_compressed_pubkey_hex(),
            num_digits: NUM_DIGITS,
            r_points: vec!["02".repeat(33); NUM_DIGITS],
            created_at: "2026-07-31T00:00:00Z".to_string(),
        };
        state.store.write_announcement(&ann).unwrap();

        let resp = get_attestation(State(state), Path(event_id)).await;
        assert_eq!(resp.into_response().status(), StatusCode::from_u16(425).unwrap());
    }
}

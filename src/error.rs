//! Error taxonomy for the oracle core.
//!
//! Every subsystem returns one of these kinds at its boundary; the HTTP layer
//! is the only place a kind is translated into a status code (see the
//! `IntoResponse` impls in `attestation`, `l402::proxy`, and `x402::proxy`).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while collecting and combining source samples into an observation.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("insufficient sources: got {got}, need {need}")]
    InsufficientSources { got: usize, need: usize },
    #[error("stablecoin divergence detected: |{stable_median} - {quote_median}| / {quote_median} exceeds {threshold}")]
    DivergenceDetected {
        stable_median: f64,
        quote_median: f64,
        threshold: f64,
    },
    #[error("unknown trading pair: {0}")]
    UnknownPair(String),
}

/// A structured `{error, detail}` body, the only shape error responses take.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

impl ErrorBody {
    pub fn new(error: &'static str, detail: impl Into<String>) -> Self {
        Self {
            error,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for AggregatorError {
    fn into_response(self) -> Response {
        let (error, status) = match &self {
            AggregatorError::InsufficientSources { .. } => {
                ("INSUFFICIENT_SOURCES", StatusCode::INTERNAL_SERVER_ERROR)
            }
            AggregatorError::DivergenceDetected { .. } => {
                ("DIVERGENCE_DETECTED", StatusCode::INTERNAL_SERVER_ERROR)
            }
            AggregatorError::UnknownPair(_) => ("UNKNOWN_PAIR", StatusCode::NOT_FOUND),
        };
        (status, Json(ErrorBody::new(error, self.to_string()))).into_response()
    }
}

/// Errors raised while serving a DLC announcement/attestation request.
#[derive(Debug, Error)]
pub enum DlcError {
    #[error("no nonce secrets for event {0}; announcement missing or already attested")]
    MissingNonces(String),
    #[error("price {price} does not fit in {num_digits} digits")]
    PriceOutOfRange { price: i64, num_digits: usize },
    #[error("announcement not found: {0}")]
    AnnouncementNotFound(String),
    #[error("event announced but not yet attested: {0}")]
    NotYetAttested(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IntoResponse for DlcError {
    fn into_response(self) -> Response {
        let status = match &self {
            DlcError::MissingNonces(_) | DlcError::PriceOutOfRange { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DlcError::AnnouncementNotFound(_) => StatusCode::NOT_FOUND,
            DlcError::NotYetAttested(_) => StatusCode::from_u16(425).unwrap(),
            DlcError::Io(_) | DlcError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = match &self {
            DlcError::MissingNonces(_) => "MISSING_NONCES",
            DlcError::PriceOutOfRange { .. } => "PRICE_OUT_OF_RANGE",
            DlcError::AnnouncementNotFound(_) => "NOT_FOUND",
            DlcError::NotYetAttested(_) => "NOT_YET_ATTESTED",
            DlcError::Io(_) | DlcError::Json(_) => "DLC_STORE_ERROR",
        };
        (status, Json(ErrorBody::new(code, self.to_string()))).into_response()
    }
}

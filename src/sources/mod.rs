//! Per-exchange and per-institution price fetchers. Every fetcher returns
//! `None` on any failure (network error, timeout, malformed payload, or a
//! sanity-band rejection) rather than propagating an error — a single dead
//! source must never take down an aggregation round.

pub mod central_banks;
pub mod exchanges;
pub mod gold;
pub mod usdc;

use rust_decimal::Decimal;
use std::time::Duration;

/// How a sample's price is denominated relative to the pair's quote
/// currency, so the aggregator knows whether it needs stablecoin
/// normalization before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denomination {
    /// Directly denominated in the pair's quote currency (e.g. USD).
    Native,
    /// Denominated in a stablecoin pegged to the quote currency (e.g. USDT),
    /// requiring multiplication by a stablecoin/quote rate before use.
    Stablecoin,
}

/// A single observation from one source.
#[derive(Debug, Clone)]
pub struct SourceSample {
    pub source: String,
    pub price: Decimal,
    pub denomination: Denomination,
}

/// A trade print used for VWAP computation: price, size, and how long ago
/// (in seconds) it occurred relative to the fetch.
#[derive(Debug, Clone, Copy)]
pub struct Trade {
    pub price: Decimal,
    pub size: Decimal,
    pub age_seconds: i64,
}

/// A VWAP sample: the size-weighted mean price over the trailing window,
/// plus the denomination it was computed in.
#[derive(Debug, Clone)]
pub struct VwapSample {
    pub source: String,
    pub price: Decimal,
    pub denomination: Denomination,
}

/// Per-request timeout every production `reqwest::Client` is built with,
/// enforcing spec's 5-second fetcher budget at the HTTP client itself
/// rather than per call site.
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(5);
/// VWAP trailing trade window.
pub const VWAP_WINDOW_SECONDS: i64 = 300;

/// Compute size-weighted average price over trades within the trailing
/// VWAP window. A window with zero volume is treated as a fetch failure.
pub fn compute_vwap(trades: &[Trade]) -> Option<Decimal> {
    let windowed: Vec<&Trade> = trades
        .iter()
        .filter(|t| t.age_seconds >= 0 && t.age_seconds <= VWAP_WINDOW_SECONDS)
        .collect();
    if windowed.is_empty() {
        return None;
    }
    let total_size: Decimal = windowed.iter().map(|t| t.size).sum();
    if total_size.is_zero() {
        return None;
    }
    let notional: Decimal = windowed.iter().map(|t| t.price * t.size).sum();
    Some(notional / total_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_vwap_weights_by_size() {
        let trades = vec![
            Trade { price: Decimal::new(100, 0), size: Decimal::new(1, 0), age_seconds: 10 },
            Trade { price: Decimal::new(200, 0), size: Decimal::new(3, 0), age_seconds: 20 },
        ];
        let vwap = compute_vwap(&trades).unwrap();
        assert_eq!(vwap, Decimal::new(175, 0));
    }

    #[test]
    fn compute_vwap_ignores_trades_outside_window() {
        let trades = vec![
            Trade { price: Decimal::new(100, 0), size: Decimal::new(1, 0), age_seconds: 400 },
        ];
        assert_eq!(compute_vwap(&trades), None);
    }
}

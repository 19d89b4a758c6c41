//! USDC/USD depeg circuit breaker: median of at least two of five
//! exchange sources, 2% default threshold, 60-second cache, fail-safe
//! (state unchanged) when fewer than two sources answer.

use std::sync::Mutex;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::sources::usdc::fetch_usdc_usd_sources;
use crate::timestamp::UnixTimestamp;

const CHECK_INTERVAL_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct DepegStatus {
    pub pegged: bool,
    pub rate: Option<f64>,
    pub sources: usize,
}

struct CachedState {
    last_checked: u64,
    depeg_active: bool,
}

pub struct DepegBreaker {
    client: reqwest::Client,
    threshold: f64,
    state: Mutex<CachedState>,
}

impl DepegBreaker {
    pub fn new(client: reqwest::Client, threshold: f64) -> Self {
        Self { client, threshold, state: Mutex::new(CachedState { last_checked: 0, depeg_active: false }) }
    }

    pub async fn check(&self) -> DepegStatus {
        {
            let state = self.state.lock().expect("depeg mutex poisoned");
            let now = UnixTimestamp::now().0;
            if now.saturating_sub(state.last_checked) < CHECK_INTERVAL_SECONDS {
                return DepegStatus { pegged: !state.depeg_active, rate: None, sources: 0 };
            }
        }

        let samples = fetch_usdc_usd_sources(&self.client).await;
        let now = UnixTimestamp::now().0;
        let mut state = self.state.lock().expect("depeg mutex poisoned");
        state.last_checked = now;

        if samples.len() < 2 {
            tracing::warn!(sources = samples.len(), "depeg check: insufficient sources, need 2");
            return DepegStatus { pegged: !state.depeg_active, rate: None, sources: samples.len() };
        }

        let rate = median(samples.iter().map(|s| s.price).collect());
        let deviation = (rate - Decimal::ONE).abs();
        let threshold = Decimal::try_from(self.threshold).unwrap_or(Decimal::new(2, 2));

        if deviation > threshold {
            if !state.depeg_active {
                tracing::warn!(rate = %rate, sources = samples.len(), "USDC depeg circuit breaker active");
            }
            state.depeg_active = true;
            DepegStatus { pegged: false, rate: rate.to_f64(), sources: samples.len() }
        } else {
            if state.depeg_active {
                tracing::info!(rate = %rate, "USDC depeg circuit breaker cleared");
            }
            state.depeg_active = false;
            DepegStatus { pegged: true, rate: rate.to_f64(), sources: samples.len() }
        }
    }
}

fn median(mut values: Vec<Decimal>) -> Decimal {
    values.sort();
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / Decimal::TWO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_count() {
        let values = vec![Decimal::new(99, 2), Decimal::new(100, 2), Decimal::new(101, 2)];
        assert_eq!(median(values), Decimal::new(100, 2));
    }

    #[test]
    fn median_of_even_count_averages_middle_two() {
        let values = vec![Decimal::new(98, 2), Decimal::new(100, 2)];
        assert_eq!(median(values), Decimal::new(99, 2));
    }
}

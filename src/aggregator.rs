//! Combines per-source samples into a single quorum-checked observation:
//! stablecoin normalization, a divergence circuit breaker that drops the
//! stablecoin leg entirely when it disagrees with the native leg, a
//! quorum-gated median/VWAP, and cross-rate composition for pairs that are
//! derived by dividing two other aggregations.

use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::error::AggregatorError;
use crate::pair::{AggregationMethod, PairRegistry, TradingPair};
use crate::sources::{exchanges, Denomination, SourceSample};

/// Relative divergence above which stablecoin-denominated spot samples are
/// dropped entirely rather than normalized in.
pub const SPOT_DIVERGENCE_THRESHOLD: f64 = 0.005;
/// Same breaker, looser threshold for VWAP samples (wider window, thinner
/// liquidity tolerance).
pub const VWAP_DIVERGENCE_THRESHOLD: f64 = 0.01;

/// A single published observation: the combined price and the sources that
/// contributed to it (after any divergence-driven drop).
#[derive(Debug, Clone)]
pub struct Observation {
    pub price: Decimal,
    pub sources: Vec<String>,
    pub degraded: bool,
}

pub struct FeedAggregator {
    client: Client,
    registry: PairRegistry,
}

impl FeedAggregator {
    pub fn new(client: Client, registry: PairRegistry) -> Self {
        Self { client, registry }
    }

    pub fn registry(&self) -> &PairRegistry {
        &self.registry
    }

    #[instrument(skip(self), fields(pair = route_key))]
    pub async fn observe(&self, route_key: &str) -> Result<Observation, AggregatorError> {
        let pair = self
            .registry
            .get(route_key)
            .ok_or_else(|| AggregatorError::UnknownPair(route_key.to_string()))?;

        match pair.method {
            AggregationMethod::Median | AggregationMethod::Vwap => {
                self.observe_direct(route_key, pair).await
            }
            AggregationMethod::Cross { numerator, denominator } => {
                self.observe_cross(numerator, denominator).await
            }
        }
    }

    async fn observe_direct(
        &self,
        route_key: &str,
        pair: &TradingPair,
    ) -> Result<Observation, AggregatorError> {
        let samples = self.fetch_samples(route_key, pair).await;
        let threshold = match pair.method {
            AggregationMethod::Vwap => VWAP_DIVERGENCE_THRESHOLD,
            _ => SPOT_DIVERGENCE_THRESHOLD,
        };
        self.combine(samples, pair, threshold).await
    }

    async fn fetch_samples(&self, route_key: &str, pair: &TradingPair) -> Vec<SourceSample> {
        match route_key {
            "btcusd" => exchanges::fetch_btcusd_sources(&self.client).await,
            "btcusd/vwap" => exchanges::fetch_btcusd_vwap_sources(&self.client).await,
            "ethusd" => exchanges::fetch_ethusd_sources(&self.client).await,
            "solusd" => exchanges::fetch_solusd_sources(&self.client).await,
            "eurusd" => crate::sources::central_banks::fetch_eurusd_sources(&self.client).await,
            "xauusd" => crate::sources::gold::fetch_xauusd_sources(&self.client).await,
            _ => {
                warn!(pair = pair.symbol, "no fetcher roster registered for direct pair");
                Vec::new()
            }
        }
    }

    /// Apply stablecoin normalization, the divergence breaker, and the
    /// quorum-gated median to a raw sample set.
    async fn combine(
        &self,
        samples: Vec<SourceSample>,
        pair: &TradingPair,
        divergence_threshold: f64,
    ) -> Result<Observation, AggregatorError> {
        let (native, stable): (Vec<_>, Vec<_>) = samples
            .into_iter()
            .partition(|s| s.denomination == Denomination::Native);

        let mut degraded = false;
        let mut combined = native.clone();

        if !stable.is_empty() {
            let (rate, rate_sources) = exchanges::fetch_usdt_usd_rate(&self.client).await;
            if rate_sources < 2 {
                degraded = true;
            } else {
                let converted: Vec<SourceSample> = stable
                    .iter()
                    .map(|s| SourceSample {
                        source: s.source.clone(),
                        price: s.price * rate,
                        denomination: Denomination::Native,
                    })
                    .collect();

                if !native.is_empty() {
                    let native_median = median(&native.iter().map(|s| s.price).collect::<Vec<_>>());
                    let stable_median = median(&converted.iter().map(|s| s.price).collect::<Vec<_>>());
                    let divergence = relative_diff(native_median, stable_median);
                    if divergence > divergence_threshold {
                        warn!(
                            pair = pair.symbol,
                            divergence,
                            threshold = divergence_threshold,
                            "stablecoin divergence breaker tripped, dropping stablecoin leg"
                        );
                        degraded = true;
                    } else {
                        combined.extend(converted);
                    }
                } else {
                    combined.extend(converted);
                }
            }
        }

        let required = if degraded { pair.degraded_quorum } else { pair.quorum };
        if combined.len() < required {
            return Err(AggregatorError::InsufficientSources {
                got: combined.len(),
                need: required,
            });
        }

        let price = median(&combined.iter().map(|s| s.price).collect::<Vec<_>>());
        let mut sources: Vec<String> = combined.into_iter().map(|s| s.source).collect();
        sources.sort();
        sources.dedup();

        info!(pair = pair.symbol, %price, source_count = sources.len(), degraded, "observation combined");

        Ok(Observation { price, sources, degraded })
    }

    async fn observe_cross(
        &self,
        numerator_key: &str,
        denominator_key: &str,
    ) -> Result<Observation, AggregatorError> {
        let (num, den) = tokio::join!(
            Box::pin(self.observe(numerator_key)),
            Box::pin(self.observe(denominator_key))
        );
        let num = num?;
        let den = den?;
        if den.price.is_zero() {
            return Err(AggregatorError::InsufficientSources { got: 0, need: 1 });
        }
        let mut sources = num.sources;
        sources.extend(den.sources);
        sources.sort();
        sources.dedup();
        Ok(Observation {
            price: num.price / den.price,
            sources,
            degraded: num.degraded || den.degraded,
        })
    }
}

fn median(values: &[Decimal]) -> Decimal {
    let mut sorted = values.to_vec();
    sorted.sort();
    let len = sorted.len();
    if len == 0 {
        return Decimal::ZERO;
    }
    let mid = len / 2;
    if len % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / Decimal::from(2)
    } else {
        sorted[mid]
    }
}

fn relative_diff(a: Decimal, b: Decimal) -> f64 {
    if a.is_zero() {
        return f64::INFINITY;
    }
    let diff = (a - b).abs() / a.abs();
    diff.try_into().unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, price: i64, scale: u32, denom: Denomination) -> SourceSample {
        SourceSample {
            source: name.to_string(),
            price: Decimal::new(price, scale),
            denomination: denom,
        }
    }

    #[test]
    fn median_of_even_length_is_mean_of_two_middle() {
        let values = vec![Decimal::new(100, 0), Decimal::new(200, 0), Decimal::new(300, 0), Decimal::new(400, 0)];
        assert_eq!(median(&values), Decimal::new(250, 0));
    }

    #[test]
    fn median_of_odd_length_is_middle_value() {
        let values = vec![Decimal::new(100, 0), Decimal::new(300, 0), Decimal::new(200, 0)];
        assert_eq!(median(&values), Decimal::new(200, 0));
    }

    #[test]
    fn relative_diff_is_symmetric_in_magnitude() {
        let a = Decimal::new(100, 0);
        let b = Decimal::new(101, 0);
        let diff = relative_diff(a, b);
        assert!((diff - 0.01).abs() < 1e-9);
    }

    #[tokio::test]
    async fn combine_requires_full_quorum_when_no_stablecoin_samples_present() {
        let aggregator = FeedAggregator::new(Client::new(), PairRegistry::default());
        let pair = aggregator.registry().get("ethusd").unwrap().clone();
        let samples = vec![
            sample("a", 100, 0, Denomination::Native),
            sample("b", 101, 0, Denomination::Native),
        ];
        let result = aggregator.combine(samples, &pair, SPOT_DIVERGENCE_THRESHOLD).await;
        assert!(matches!(result, Err(AggregatorError::InsufficientSources { .. })));
    }
}

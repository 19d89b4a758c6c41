//! The roster of trading pairs the oracle serves, and how each one's price
//! is derived: a direct quorum-median/VWAP of source samples, or a cross
//! rate composed from two already-aggregated pairs.

use std::collections::BTreeMap;

/// How a pair's price is computed from its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMethod {
    /// Quorum median of simultaneous spot samples.
    Median,
    /// Size-weighted average price over a trailing trade window.
    Vwap,
    /// Quotient of two already-aggregated pairs sharing a common quote
    /// currency (e.g. BTC/EUR = (BTC/USD) / (EUR/USD)).
    Cross { numerator: &'static str, denominator: &'static str },
}

impl AggregationMethod {
    /// The `<method>` field of the canonical string.
    pub fn as_canonical_str(&self) -> &'static str {
        match self {
            AggregationMethod::Median => "median",
            AggregationMethod::Vwap => "vwap",
            AggregationMethod::Cross { .. } => "cross",
        }
    }
}

/// One servable pair: its symbol, quote currency, decimal precision, fixed
/// canonical nonce, quorum requirement, and aggregation method.
#[derive(Debug, Clone)]
pub struct TradingPair {
    /// Route key and canonical `SYMBOL` field, e.g. `BTCUSD`.
    pub symbol: &'static str,
    /// Canonical `QUOTE` field, e.g. `USD`.
    pub quote: &'static str,
    pub decimals: u32,
    /// Fixed per-pair nonce baked into every canonical string for this pair.
    pub nonce: &'static str,
    pub method: AggregationMethod,
    /// Minimum number of independent source samples required to publish.
    pub quorum: usize,
    /// Quorum when one or more stablecoin-denominated sources were dropped
    /// by the divergence breaker.
    pub degraded_quorum: usize,
}

/// The full set of pairs this instance can serve, keyed by their route
/// segment (e.g. `btcusd`, `btcusd/vwap`).
pub struct PairRegistry {
    pairs: BTreeMap<&'static str, TradingPair>,
}

impl PairRegistry {
    pub fn get(&self, route_key: &str) -> Option<&TradingPair> {
        self.pairs.get(route_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &TradingPair)> {
        self.pairs.iter().map(|(k, v)| (*k, v))
    }

    pub fn route_keys(&self) -> Vec<&'static str> {
        self.pairs.keys().copied().collect()
    }
}

impl Default for PairRegistry {
    fn default() -> Self {
        let mut pairs = BTreeMap::new();

        pairs.insert(
            "btcusd",
            TradingPair {
                symbol: "BTCUSD",
                quote: "USD",
                decimals: 2,
                nonce: "890123",
                method: AggregationMethod::Median,
                quorum: 6,
                degraded_quorum: 4,
            },
        );
        pairs.insert(
            "btcusd/vwap",
            TradingPair {
                symbol: "BTCUSD",
                quote: "USD",
                decimals: 2,
                nonce: "890123",
                method: AggregationMethod::Vwap,
                quorum: 5,
                degraded_quorum: 3,
            },
        );
        pairs.insert(
            "ethusd",
            TradingPair {
                symbol: "ETHUSD",
                quote: "USD",
                decimals: 2,
                nonce: "890123",
                method: AggregationMethod::Median,
                quorum: 4,
                degraded_quorum: 3,
            },
        );
        pairs.insert(
            "eurusd",
            TradingPair {
                symbol: "EURUSD",
                quote: "USD",
                decimals: 5,
                nonce: "901234",
                method: AggregationMethod::Median,
                quorum: 4,
                degraded_quorum: 4,
            },
        );
        pairs.insert(
            "xauusd",
            TradingPair {
                symbol: "XAUUSD",
                quote: "USD",
                decimals: 2,
                nonce: "912345",
                method: AggregationMethod::Median,
                quorum: 3,
                degraded_quorum: 2,
            },
        );
        pairs.insert(
            "solusd",
            TradingPair {
                symbol: "SOLUSD",
                quote: "USD",
                decimals: 2,
                nonce: "890123",
                method: AggregationMethod::Median,
                quorum: 4,
                degraded_quorum: 3,
            },
        );

        pairs.insert(
            "btceur",
            TradingPair {
                symbol: "BTCEUR",
                quote: "EUR",
                decimals: 2,
                nonce: "890123",
                method: AggregationMethod::Cross {
                    numerator: "btcusd",
                    denominator: "eurusd",
                },
                quorum: 2,
                degraded_quorum: 2,
            },
        );
        pairs.insert(
            "etheur",
            TradingPair {
                symbol: "ETHEUR",
                quote: "EUR",
                decimals: 2,
                nonce: "890123",
                method: AggregationMethod::Cross {
                    numerator: "ethusd",
                    denominator: "eurusd",
                },
                quorum: 2,
                degraded_quorum: 2,
            },
        );
        pairs.insert(
            "soleur",
            TradingPair {
                symbol: "SOLEUR",
                quote: "EUR",
                decimals: 2,
                nonce: "890123",
                method: AggregationMethod::Cross {
                    numerator: "solusd",
                    denominator: "eurusd",
                },
                quorum: 2,
                degraded_quorum: 2,
            },
        );
        pairs.insert(
            "xaueur",
            TradingPair {
                symbol: "XAUEUR",
                quote: "EUR",
                decimals: 2,
                nonce: "912345",
                method: AggregationMethod::Cross {
                    numerator: "xauusd",
                    denominator: "eurusd",
                },
                quorum: 2,
                degraded_quorum: 2,
            },
        );

        Self { pairs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_pairs_reference_existing_component_pairs() {
        let registry = PairRegistry::default();
        for (_, pair) in registry.iter() {
            if let AggregationMethod::Cross { numerator, denominator } = pair.method {
                assert!(registry.get(numerator).is_some(), "missing {numerator}");
                assert!(registry.get(denominator).is_some(), "missing {denominator}");
            }
        }
    }

    #[test]
    fn every_pair_has_a_positive_quorum() {
        let registry = PairRegistry::default();
        for (key, pair) in registry.iter() {
            assert!(pair.quorum > 0, "{key} has zero quorum");
            assert!(pair.degraded_quorum > 0, "{key} has zero degraded quorum");
        }
    }
}

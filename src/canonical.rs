//! The canonical signing string: a pipe-delimited, version-tagged
//! representation of a single price observation. This is the exact byte
//! sequence that gets SHA-256 hashed and signed — any change to its shape
//! breaks verification for every consumer holding an oracle public key.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// `v1|<SYMBOL>|<price>|<QUOTE>|<decimals>|<RFC3339-UTC-timestamp>|<nonce>|<sorted-dedup-sources-csv>|<method>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub symbol: String,
    pub price: Decimal,
    pub quote: String,
    pub decimals: u32,
    pub timestamp: String,
    pub nonce: String,
    pub sources: Vec<String>,
    pub method: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseCanonicalError {
    #[error("expected 9 pipe-delimited fields, found {0}")]
    WrongFieldCount(usize),
    #[error("unsupported canonical version: {0}")]
    UnsupportedVersion(String),
    #[error("invalid decimals field: {0}")]
    InvalidDecimals(String),
    #[error("invalid price field: {0}")]
    InvalidPrice(String),
}

impl Canonical {
    /// Build the exact wire string. Sources are sorted and deduplicated so
    /// the string is stable regardless of fetcher completion order.
    pub fn build(&self) -> String {
        let mut sources = self.sources.clone();
        sources.sort();
        sources.dedup();
        let value = format_decimal_fixed(self.price, self.decimals);
        format!(
            "v1|{}|{}|{}|{}|{}|{}|{}|{}",
            self.symbol,
            value,
            self.quote,
            self.decimals,
            self.timestamp,
            self.nonce,
            sources.join(","),
            self.method,
        )
    }

    /// SHA-256 digest of the canonical string, the exact bytes every
    /// signature scheme signs over.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.build().as_bytes());
        hasher.finalize().into()
    }

    /// Parse a canonical string back into its fields. The inverse of
    /// `build`, needed so clients and tests can validate a statement without
    /// re-deriving it from the aggregator.
    pub fn parse(s: &str) -> Result<Self, ParseCanonicalError> {
        let fields: Vec<&str> = s.split('|').collect();
        if fields.len() != 9 {
            return Err(ParseCanonicalError::WrongFieldCount(fields.len()));
        }
        if fields[0] != "v1" {
            return Err(ParseCanonicalError::UnsupportedVersion(fields[0].to_string()));
        }
        let decimals: u32 = fields[4]
            .parse()
            .map_err(|_| ParseCanonicalError::InvalidDecimals(fields[4].to_string()))?;
        let price: Decimal = fields[2]
            .parse()
            .map_err(|_| ParseCanonicalError::InvalidPrice(fields[2].to_string()))?;
        let sources = if fields[7].is_empty() {
            Vec::new()
        } else {
            fields[7].split(',').map(|s| s.to_string()).collect()
        };
        Ok(Canonical {
            symbol: fields[1].to_string(),
            price,
            quote: fields[3].to_string(),
            decimals,
            timestamp: fields[5].to_string(),
            nonce: fields[6].to_string(),
            sources,
            method: fields[8].to_string(),
        })
    }
}

fn format_decimal_fixed(value: Decimal, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Canonical {
        Canonical {
            symbol: "BTCUSD".to_string(),
            price: Decimal::new(6543210, 2),
            quote: "USD".to_string(),
            decimals: 2,
            timestamp: "2026-07-31T00:00:00Z".to_string(),
            nonce: "890123".to_string(),
            sources: vec!["kraken".to_string(), "coinbase".to_string(), "kraken".to_string()],
            method: "median".to_string(),
        }
    }

    #[test]
    fn build_sorts_and_dedups_sources() {
        let built = sample().build();
        assert_eq!(
            built,
            "v1|BTCUSD|65432.10|USD|2|2026-07-31T00:00:00Z|890123|coinbase,kraken|median"
        );
    }

    #[test]
    fn parse_is_inverse_of_build_for_deduped_input() {
        let mut c = sample();
        c.sources = vec!["coinbase".to_string(), "kraken".to_string()];
        let built = c.build();
        let parsed = Canonical::parse(&built).unwrap();
        assert_eq!(parsed, c);
        assert_eq!(parsed.build(), built);
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert_eq!(
            Canonical::parse("v1|BTCUSD|1|USD"),
            Err(ParseCanonicalError::WrongFieldCount(4))
        );
    }

    #[test]
    fn parse_rejects_unsupported_version() {
        let built = sample().build().replacen("v1", "v2", 1);
        assert_eq!(
            Canonical::parse(&built),
            Err(ParseCanonicalError::UnsupportedVersion("v2".to_string()))
        );
    }

    #[test]
    fn digest_is_sha256_of_build() {
        let c = sample();
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(c.build().as_bytes());
            let out: [u8; 32] = hasher.finalize().into();
            out
        };
        assert_eq!(c.digest(), expected);
    }
}

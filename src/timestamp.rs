use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::time::{SystemTime, SystemTimeError};

/// A Unix timestamp represented as a `u64`, seconds since the epoch
/// (1970-01-01T00:00:00Z).
///
/// Used for invoice/payment expiry windows and enforcement bookkeeping.
/// Serialized as a stringified integer to avoid precision loss in JSON, the
/// same convention the payment wire types use for large integers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq)]
pub struct UnixTimestamp(pub u64);

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let ts = s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))?;
        Ok(UnixTimestamp(ts))
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0 + rhs)
    }
}

impl UnixTimestamp {
    pub fn try_now() -> Result<Self, SystemTimeError> {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_secs();
        Ok(Self(now))
    }

    pub fn now() -> Self {
        Self::try_now().unwrap_or(Self(0))
    }

    pub fn seconds_since_epoch(&self) -> u64 {
        self.0
    }

    /// Render as `YYYY-MM-DDTHH:MM:SSZ`, the exact form the canonical signing
    /// string and DLC maturity epochs use.
    pub fn to_rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.0 as i64, 0)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Parse the canonical `YYYY-MM-DDTHH:MM:SSZ` form back into a timestamp.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc).timestamp() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_rfc3339() {
        let ts = UnixTimestamp(1_700_000_000);
        let rendered = ts.to_rfc3339();
        assert!(rendered.ends_with('Z'));
        assert_eq!(UnixTimestamp::parse_rfc3339(&rendered), Some(ts));
    }

    #[test]
    fn serializes_as_stringified_integer() {
        let ts = UnixTimestamp(42);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"42\"");
    }
}

//! Hourly announcement and attestation loop: pre-commits nonces for the
//! next 24 hourly events, then attests each event once its maturity
//! timestamp has passed.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::aggregator::FeedAggregator;
use crate::error::DlcError;
use crate::signing::KeyStore;

use super::schnorr::{self, NUM_DIGITS};
use super::store::{Announcement, Attestation, DlcStore, NonceSecrets};

/// The only pair the DLC sub-oracle attests.
pub const DLC_PAIR: &str = "BTCUSD";
const DLC_ROUTE_KEY: &str = "btcusd";
const ANNOUNCEMENT_HORIZON_HOURS: usize = 24;

pub struct DlcScheduler {
    store: DlcStore,
    keys: Arc<KeyStore>,
    aggregator: Arc<FeedAggregator>,
}

impl DlcScheduler {
    pub fn new(store: DlcStore, keys: Arc<KeyStore>, aggregator: Arc<FeedAggregator>) -> Self {
        Self { store, keys, aggregator }
    }

    pub fn event_id(maturity_ts: &str) -> String {
        format!("{DLC_PAIR}-{maturity_ts}")
    }

    /// The next `n` hour-boundary UTC timestamps, rendered
    /// `YYYY-MM-DDTHH:MM:SSZ`, starting at the next full hour.
    pub fn next_hours(n: usize) -> Vec<String> {
        let now: DateTime<Utc> = Utc::now();
        let next_hour = now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now)
            + ChronoDuration::hours(1);
        (0..n as i64)
            .map(|i| (next_hour + ChronoDuration::hours(i)).format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .collect()
    }

    /// How long to sleep before the next sweep: until 5 seconds past the
    /// next wall-clock hour boundary, never negative.
    fn duration_until_next_sweep() -> StdDuration {
        let next = Self::next_hours(1);
        let boundary = DateTime::parse_from_rfc3339(&next[0])
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now() + ChronoDuration::hours(1));
        let target = boundary + ChronoDuration::seconds(5);
        (target - Utc::now()).to_std().unwrap_or(StdDuration::from_secs(1))
    }

    /// Create announcements for every upcoming hour in the horizon that
    /// doesn't already have one.
    #[instrument(skip(self))]
    pub fn announce_upcoming(&self) -> Result<usize, DlcError> {
        let mut created = 0;
        for maturity in Self::next_hours(ANNOUNCEMENT_HORIZON_HOURS) {
            let event_id = Self::event_id(&maturity);
            if self.store.read_announcement(&event_id).is_ok() {
                continue;
            }
            self.create_announcement(&event_id, &maturity)?;
            created += 1;
        }
        if created > 0 {
            info!(created, "published new DLC announcements");
        }
        Ok(created)
    }

    fn create_announcement(&self, event_id: &str, maturity: &str) -> Result<Announcement, DlcError> {
        let mut nonce_secrets = Vec::with_capacity(NUM_DIGITS);
        let mut r_points = Vec::with_capacity(NUM_DIGITS);
        for _ in 0..NUM_DIGITS {
            let nonce = schnorr::generate_nonce();
            nonce_secrets.push(hex::encode(schnorr::scalar_to_bytes(&nonce.secret)));
            r_points.push(hex::encode(nonce.point_compressed));
        }

        self.store.write_nonces(&NonceSecrets { event_id: event_id.to_string(), nonce_secrets })?;

        let announcement = Announcement {
            event_id: event_id.to_string(),
            pair: DLC_PAIR.to_string(),
            maturity: maturity.to_string(),
            oracle_pubkey: self.keys.secp256k1_compressed_pubkey_hex(),
            num_digits: NUM_DIGITS,
            r_points,
            created_at: crate::timestamp::UnixTimestamp::now().to_rfc3339(),
        };
        self.store.write_announcement(&announcement)?;
        Ok(announcement)
    }

    /// Attest every announced event whose maturity has passed and which
    /// has no attestation yet. Events with missing nonces (already
    /// attested, or the secrets file was lost) or an out-of-range price
    /// are logged and skipped, never allowed to stop the loop.
    #[instrument(skip(self))]
    pub async fn attest_due(&self) -> usize {
        let now = crate::timestamp::UnixTimestamp::now();
        let mut attested = 0;
        for event_id in self.store.list_announced_event_ids() {
            if self.store.has_attestation(&event_id) {
                continue;
            }
            let announcement = match self.store.read_announcement(&event_id) {
                Ok(a) => a,
                Err(e) => {
                    warn!(event_id, error = %e, "could not read announcement during attestation sweep");
                    continue;
                }
            };
            let Some(maturity) = crate::timestamp::UnixTimestamp::parse_rfc3339(&announcement.maturity) else {
                warn!(event_id, "announcement has an unparseable maturity timestamp");
                continue;
            };
            if maturity > now {
                continue;
            }

            match self.attest_event(&announcement).await {
                Ok(_) => attested += 1,
                Err(DlcError::MissingNonces(eid)) => {
                    warn!(event_id = %eid, "no nonce secrets for matured event, skipping attestation");
                }
                Err(DlcError::PriceOutOfRange { price, num_digits }) => {
                    warn!(event_id, price, num_digits, "price does not fit in digit budget, skipping attestation");
                }
                Err(e) => {
                    warn!(event_id, error = %e, "failed to attest matured event");
                }
            }
        }
        if attested > 0 {
            info!(attested, "published new DLC attestations");
        }
        attested
    }

    async fn attest_event(&self, announcement: &Announcement) -> Result<Attestation, DlcError> {
        let nonces = self.store.read_nonces(&announcement.event_id)?;

        let observation = self
            .aggregator
            .observe(DLC_ROUTE_KEY)
            .await
            .map_err(|e| DlcError::Io(std::io::Error::other(e.to_string())))?;
        let price_rounded = observation
            .price
            .round()
            .to_i64()
            .ok_or(DlcError::PriceOutOfRange { price: i64::MAX, num_digits: NUM_DIGITS })?;

        let digits = schnorr::decompose_price(price_rounded)
            .ok_or(DlcError::PriceOutOfRange { price: price_rounded, num_digits: NUM_DIGITS })?;

        let oracle_scalar = self.keys.secp256k1_scalar();
        let mut s_values = Vec::with_capacity(NUM_DIGITS);
        for (i, &digit) in digits.iter().enumerate() {
            let nonce_secret_bytes: [u8; 32] = hex::decode(&nonces.nonce_secrets[i])
                .ok()
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| DlcError::MissingNonces(announcement.event_id.clone()))?;
            let nonce_secret = schnorr::scalar_from_bytes(&nonce_secret_bytes)
                .ok_or_else(|| DlcError::MissingNonces(announcement.event_id.clone()))?;
            let challenge = schnorr::digit_challenge(&announcement.event_id, i, digit);
            let s = schnorr::compute_s(nonce_secret, challenge, oracle_scalar);
            s_values.push(hex::encode(schnorr::scalar_to_bytes(&s)));
        }

        let attestation = Attestation {
            event_id: announcement.event_id.clone(),
            pair: DLC_PAIR.to_string(),
            maturity: announcement.maturity.clone(),
            oracle_pubkey: announcement.oracle_pubkey.clone(),
            price: price_rounded,
            price_digits: digits.to_vec(),
            s_values,
            attested_at: crate::timestamp::UnixTimestamp::now().to_rfc3339(),
        };
        self.store.write_attestation(&attestation)?;
        // The attestation file must be durable before the only copy of the
        // nonce secrets is removed.
        self.store.delete_nonces(&announcement.event_id)?;
        Ok(attestation)
    }

    /// Run one announce+attest sweep, for the scheduler binary's `--once`
    /// mode.
    pub async fn run_once(&self) -> Result<(), DlcError> {
        self.announce_upcoming()?;
        self.attest_due().await;
        Ok(())
    }

    /// Run the sweep on every wall-clock hour boundary, forever, until
    /// `token` is cancelled. Cancellation is only observed while sleeping
    /// between sweeps — an in-flight sweep always runs to completion.
    pub async fn run_until_cancelled(&self, token: CancellationToken) {
        loop {
            let sleep_for = Self::duration_until_next_sweep();
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = token.cancelled() => return,
            }
            if let Err(e) = self.announce_upcoming() {
                warn!(error = %e, "DLC announcement sweep failed");
            }
            self.attest_due().await;
            if token.is_cancelled() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_hours_returns_requested_count_in_order() {
        let hours = DlcScheduler::next_hours(24);
        assert_eq!(hours.len(), 24);
        for pair in hours.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn event_id_combines_pair_and_maturity() {
        assert_eq!(DlcScheduler::event_id("2026-08-01T15:00:00Z"), "BTCUSD-2026-08-01T15:00:00Z");
    }

    #[test]
    fn duration_until_next_sweep_is_bounded_by_one_hour() {
        let d = DlcScheduler::duration_until_next_sweep();
        assert!(d > StdDuration::from_secs(0));
        assert!(d <= StdDuration::from_secs(3605));
    }
}

//! Shared application state for the attestation HTTP listener.

use std::sync::Arc;

use crate::aggregator::FeedAggregator;
use crate::config::Config;
use crate::signing::KeyStore;

pub struct OracleState {
    pub aggregator: FeedAggregator,
    pub keys: KeyStore,
    pub config: Config,
}

pub type SharedOracleState = Arc<OracleState>;

//! CLI/environment configuration, mirroring the facilitator's `clap::Parser`
//! configuration loader but with one flag/env pair per field rather than a
//! nested JSON document, since this service has no per-chain fan-out to
//! configure.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "sovereign-oracle")]
#[command(about = "Payment-gated price attestation oracle")]
pub struct Config {
    /// Bind address for all HTTP listeners.
    #[arg(long, env = "ORACLE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port for the unauthenticated attestation/status endpoints.
    #[arg(long, env = "ATTESTATION_PORT", default_value_t = 9100)]
    pub attestation_port: u16,

    /// Port for the L402 (Lightning) payment-gated proxy.
    #[arg(long, env = "L402_PORT", default_value_t = 9200)]
    pub l402_port: u16,

    /// Port for the x402 (USDC) payment-gated proxy.
    #[arg(long, env = "X402_PORT", default_value_t = 9300)]
    pub x402_port: u16,

    /// Port for the DLC sub-oracle's read endpoints.
    #[arg(long, env = "DLC_PORT", default_value_t = 9400)]
    pub dlc_port: u16,

    /// Root directory for persisted keys and DLC announcement/attestation
    /// data; `keys/` and `dlc/data/` live under here.
    #[arg(long, env = "ORACLE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Base URL of the Lightning node's REST API (LND-compatible).
    #[arg(long, env = "LND_REST_HOST")]
    pub lnd_rest_host: Option<String>,

    /// Path to the Lightning node's TLS certificate.
    #[arg(long, env = "LND_TLS_CERT_PATH")]
    pub lnd_tls_cert_path: Option<PathBuf>,

    /// Path to a macaroon granting invoice-creation permission on the
    /// Lightning node.
    #[arg(long, env = "LND_MACAROON_PATH")]
    pub lnd_macaroon_path: Option<PathBuf>,

    /// CDP-style facilitator API key id, required for x402 settlement.
    #[arg(long, env = "FACILITATOR_KEY_ID")]
    pub facilitator_key_id: Option<String>,

    /// CDP-style facilitator API key secret (PEM, EC or Ed25519), required
    /// for x402 settlement.
    #[arg(long, env = "FACILITATOR_KEY_SECRET")]
    pub facilitator_key_secret: Option<String>,

    /// Base URL of the x402 facilitator service.
    #[arg(long, env = "FACILITATOR_URL", default_value = "https://x402.org/facilitator")]
    pub facilitator_url: String,

    /// USDC receiving address the x402 proxy requests payment to.
    #[arg(long, env = "X402_RECEIVING_ADDRESS")]
    pub receiving_address: Option<String>,

    /// Relative depeg threshold (e.g. 0.02 for 2%) above which the x402
    /// proxy refuses to accept payment.
    #[arg(long, env = "DEPEG_THRESHOLD", default_value_t = 0.02)]
    pub depeg_threshold: f64,

    /// Oracle identity string embedded in the cross-certification
    /// statement.
    #[arg(long, env = "ORACLE_ID", default_value = "mycelia-signal")]
    pub oracle_id: String,
}

impl Config {
    pub fn load() -> Self {
        Config::parse()
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn dlc_data_dir(&self) -> PathBuf {
        self.data_dir.join("dlc").join("data")
    }

    /// Validate that the fields required for the x402 proxy to operate are
    /// present. Missing required configuration is a fatal startup error
    /// (exit code 1), not a runtime 500.
    pub fn validate_x402(&self) -> Result<(), String> {
        if self.facilitator_key_id.is_none() {
            return Err("FACILITATOR_KEY_ID is required to run the x402 proxy".to_string());
        }
        if self.facilitator_key_secret.is_none() {
            return Err("FACILITATOR_KEY_SECRET is required to run the x402 proxy".to_string());
        }
        if self.receiving_address.is_none() {
            return Err("X402_RECEIVING_ADDRESS is required to run the x402 proxy".to_string());
        }
        Ok(())
    }

    /// Validate that the fields required for the L402 proxy to operate are
    /// present.
    pub fn validate_l402(&self) -> Result<(), String> {
        if self.lnd_rest_host.is_none() {
            return Err("LND_REST_HOST is required to run the L402 proxy".to_string());
        }
        if self.lnd_macaroon_path.is_none() {
            return Err("LND_MACAROON_PATH is required to run the L402 proxy".to_string());
        }
        Ok(())
    }
}

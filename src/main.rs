//! Sovereign Oracle entrypoint: four independent Axum listeners —
//! unauthenticated attestation, L402 (Lightning), x402 (USDC), and the DLC
//! sub-oracle's read endpoints — sharing one signing identity and one
//! price aggregator, brought down together on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use sovereign_oracle::aggregator::FeedAggregator;
use sovereign_oracle::attestation;
use sovereign_oracle::config::Config;
use sovereign_oracle::dlc::scheduler::DlcScheduler;
use sovereign_oracle::dlc::server::{self as dlc_server, DlcServerState};
use sovereign_oracle::dlc::store::DlcStore;
use sovereign_oracle::l402::lightning::{LightningBackend, LndRestBackend};
use sovereign_oracle::l402::proxy::{self as l402_proxy, L402ProxyState};
use sovereign_oracle::pair::PairRegistry;
use sovereign_oracle::sig_down::SigDown;
use sovereign_oracle::signing::KeyStore;
use sovereign_oracle::state::OracleState;
use sovereign_oracle::telemetry::Telemetry;
use sovereign_oracle::x402::depeg::DepegBreaker;
use sovereign_oracle::x402::enforcement::EnforcementStore;
use sovereign_oracle::x402::facilitator::FacilitatorClient;
use sovereign_oracle::x402::jwt::CdpSigner;
use sovereign_oracle::x402::nonce::PaymentNonceStore;
use sovereign_oracle::x402::proxy::{self as x402_proxy, X402ProxyState};

#[tokio::main]
async fn main() {
    dotenv().ok();
    Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load();
    let keys = Arc::new(KeyStore::load_or_generate(&config.keys_dir()).unwrap_or_else(|e| {
        tracing::error!("failed to load or generate signing keys: {e}");
        std::process::exit(1);
    }));

    let http = reqwest::Client::builder()
        .timeout(sovereign_oracle::sources::SOURCE_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("failed to construct HTTP client: {e}");
            std::process::exit(1);
        });
    let registry = PairRegistry::default();
    let aggregator = Arc::new(FeedAggregator::new(http.clone(), PairRegistry::default()));

    let sig_down = SigDown::try_new().unwrap_or_else(|e| {
        tracing::error!("failed to install signal handlers: {e}");
        std::process::exit(1);
    });

    let telemetry = Telemetry::new();
    let attestation_base_url = format!("http://127.0.0.1:{}", config.attestation_port);

    let mut listeners = Vec::new();

    // Component D: unauthenticated attestation endpoints.
    {
        let oracle_state = Arc::new(OracleState {
            aggregator: FeedAggregator::new(http.clone(), PairRegistry::default()),
            keys: (*keys).clone(),
            config: config.clone(),
        });
        let app = attestation::routes().with_state(oracle_state).layer(telemetry.http_tracing());
        let addr = SocketAddr::new(config.host, config.attestation_port);
        listeners.push(("attestation", addr, app));
    }

    // Component 4.E: L402 (Lightning) payment-gated proxy.
    match config.validate_l402() {
        Ok(()) => {
            let lnd = LndRestBackend::new(
                config.lnd_rest_host.clone().expect("validated above"),
                load_macaroon_hex(&config),
                load_tls_cert(&config),
            );
            match lnd {
                Ok(lnd) => {
                    let macaroon_secret = derive_macaroon_secret(&keys);
                    let state = Arc::new(L402ProxyState {
                        routes: l402_proxy::build_routes(&registry, &attestation_base_url),
                        lightning: Arc::new(lnd) as Arc<dyn LightningBackend>,
                        macaroon_secret,
                        location: "sovereign-oracle".to_string(),
                        http: http.clone(),
                        attestation_base_url: attestation_base_url.clone(),
                    });
                    let app = l402_proxy::routes().with_state(state).layer(telemetry.http_tracing());
                    let addr = SocketAddr::new(config.host, config.l402_port);
                    listeners.push(("l402", addr, app));
                }
                Err(e) => tracing::error!("failed to construct Lightning backend, L402 proxy disabled: {e}"),
            }
        }
        Err(e) => tracing::warn!("L402 proxy disabled: {e}"),
    }

    // Component 4.F: x402 (USDC) payment-gated proxy. Unlike L402, a missing
    // receiving address or facilitator credentials is fatal at startup.
    match config.validate_x402() {
        Ok(()) => match build_x402_state(&config, &registry, &keys, &http, &attestation_base_url) {
            Ok(state) => {
                let app = x402_proxy::routes().with_state(state).layer(telemetry.http_tracing());
                let addr = SocketAddr::new(config.host, config.x402_port);
                listeners.push(("x402", addr, app));
            }
            Err(e) => tracing::error!("failed to construct x402 proxy state, proxy disabled: {e}"),
        },
        Err(e) => {
            tracing::error!("x402 configuration invalid: {e}");
            std::process::exit(1);
        }
    }

    // Component 4.G: DLC sub-oracle read endpoints, backed by the same
    // scheduler loop spawned below.
    {
        let store = DlcStore::new(config.dlc_data_dir()).unwrap_or_else(|e| {
            tracing::error!("failed to open DLC data directory: {e}");
            std::process::exit(1);
        });
        let dlc_state = Arc::new(DlcServerState { store, keys: keys.clone() });
        let app = dlc_server::routes().with_state(dlc_state).layer(telemetry.http_tracing());
        let addr = SocketAddr::new(config.host, config.dlc_port);
        listeners.push(("dlc", addr, app));
    }

    // DLC announcement/attestation loop runs alongside the HTTP listeners
    // in this process rather than only in the standalone scheduler binary,
    // so a single `sovereign-oracle` deployment is self-sufficient.
    {
        let store = DlcStore::new(config.dlc_data_dir()).unwrap_or_else(|e| {
            tracing::error!("failed to open DLC data directory for scheduler: {e}");
            std::process::exit(1);
        });
        let scheduler = DlcScheduler::new(store, keys.clone(), aggregator.clone());
        let token = sig_down.cancellation_token();
        tokio::spawn(async move { scheduler.run_until_cancelled(token).await });
    }

    let mut handles = Vec::new();
    for (name, addr, app) in listeners {
        let token = sig_down.cancellation_token();
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
            tracing::error!("failed to bind {name} listener on {addr}: {e}");
            std::process::exit(1);
        });
        tracing::info!(%addr, listener = name, "listening");
        handles.push(tokio::spawn(async move {
            axum::serve(listener, app).with_graceful_shutdown(async move { token.cancelled().await }).await
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

fn derive_macaroon_secret(keys: &KeyStore) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"sovereign-oracle-l402-macaroon-secret");
    hasher.update(keys.secp256k1_compressed_pubkey_hex().as_bytes());
    hasher.finalize().to_vec()
}

fn load_macaroon_hex(config: &Config) -> String {
    let path = config.lnd_macaroon_path.as_ref().expect("validated by validate_l402");
    match std::fs::read(path) {
        Ok(bytes) => hex::encode(bytes),
        Err(e) => {
            tracing::error!("failed to read LND macaroon at {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn load_tls_cert(config: &Config) -> Option<Vec<u8>> {
    let path = config.lnd_tls_cert_path.as_ref()?;
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!("failed to read LND TLS certificate at {}: {e}, connecting without pinning", path.display());
            None
        }
    }
}

fn build_x402_state(
    config: &Config,
    registry: &PairRegistry,
    keys: &Arc<KeyStore>,
    http: &reqwest::Client,
    attestation_base_url: &str,
) -> Result<Arc<X402ProxyState>, Box<dyn std::error::Error>> {
    let key_id = config.facilitator_key_id.clone().expect("validated by validate_x402");
    let key_secret = config.facilitator_key_secret.clone().expect("validated by validate_x402");
    let pay_to = config.receiving_address.clone().expect("validated by validate_x402");

    let signer = CdpSigner::new(key_id, &key_secret)?;
    let facilitator = FacilitatorClient::new(http.clone(), config.facilitator_url.clone(), signer);

    let resource_base = format!("http://{}:{}", config.host, config.x402_port);
    Ok(Arc::new(X402ProxyState {
        routes: x402_proxy::build_routes(registry, attestation_base_url, &resource_base),
        keys: keys.clone(),
        enforcement: EnforcementStore::new(),
        nonces: PaymentNonceStore::new(),
        depeg: DepegBreaker::new(http.clone(), config.depeg_threshold),
        facilitator,
        http: http.clone(),
        pay_to,
    }))
}

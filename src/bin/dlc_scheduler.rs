//! Standalone DLC announcement/attestation loop, for deployments that run
//! the sub-oracle's scheduling separately from the HTTP listeners in
//! `sovereign-oracle`.

use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use sovereign_oracle::aggregator::FeedAggregator;
use sovereign_oracle::config::Config;
use sovereign_oracle::dlc::scheduler::DlcScheduler;
use sovereign_oracle::dlc::store::DlcStore;
use sovereign_oracle::pair::PairRegistry;
use sovereign_oracle::sig_down::SigDown;
use sovereign_oracle::signing::KeyStore;
use sovereign_oracle::telemetry::Telemetry;

#[derive(Parser, Debug)]
#[command(name = "dlc-scheduler")]
#[command(about = "Hourly DLC announcement and attestation loop")]
struct Args {
    #[command(flatten)]
    config: Config,

    /// Run a single announce+attest sweep and exit, instead of looping
    /// hourly.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    Telemetry::new().with_name("dlc-scheduler").with_version(env!("CARGO_PKG_VERSION")).register();

    let args = Args::parse();
    let config = args.config;

    let keys = Arc::new(KeyStore::load_or_generate(&config.keys_dir()).unwrap_or_else(|e| {
        tracing::error!("failed to load or generate signing keys: {e}");
        std::process::exit(1);
    }));
    let store = DlcStore::new(config.dlc_data_dir()).unwrap_or_else(|e| {
        tracing::error!("failed to open DLC data directory: {e}");
        std::process::exit(1);
    });
    let http = reqwest::Client::builder()
        .timeout(sovereign_oracle::sources::SOURCE_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("failed to construct HTTP client: {e}");
            std::process::exit(1);
        });
    let aggregator = Arc::new(FeedAggregator::new(http, PairRegistry::default()));
    let scheduler = DlcScheduler::new(store, keys, aggregator);

    if args.once {
        if let Err(e) = scheduler.run_once().await {
            tracing::error!("DLC sweep failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    let sig_down = SigDown::try_new().unwrap_or_else(|e| {
        tracing::error!("failed to install signal handlers: {e}");
        std::process::exit(1);
    });
    let token = sig_down.cancellation_token();
    scheduler.run_until_cancelled(token).await;
    tracing::info!("shutting down DLC scheduler");
}

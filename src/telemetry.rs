//! Structured logging setup. A simplified stand-in for the facilitator's
//! OpenTelemetry pipeline: this service has no distributed trace collector
//! to export to, so it registers `tracing-subscriber` with an `EnvFilter`
//! and leaves request-scoped `#[instrument]` spans as the unit of
//! observability.

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub struct Telemetry {
    name: &'static str,
    version: &'static str,
}

impl Telemetry {
    pub fn new() -> Self {
        Self { name: "sovereign-oracle", version: "0.0.0" }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Initialize the global `tracing` subscriber. `RUST_LOG` controls
    /// verbosity; defaults to `info` for this crate and `warn` elsewhere.
    pub fn register(self) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,sovereign_oracle=info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        tracing::info!(name = self.name, version = self.version, "telemetry initialized");
        self
    }

    /// The per-request tracing layer shared by every HTTP listener.
    pub fn http_tracing(&self) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>> {
        TraceLayer::new_for_http()
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

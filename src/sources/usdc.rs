//! USDC/USD exchange rate sources, used only by the x402 proxy's depeg
//! circuit breaker — never by the price attestation endpoints.

use reqwest::Client;
use rust_decimal::Decimal;

use super::exchanges::{fetch_bitfinex_spot, fetch_bitstamp_spot, fetch_gemini_spot, fetch_kraken_spot};
use super::SourceSample;
use super::Denomination;

async fn fetch_coinbase_usdc(client: &Client) -> Option<Decimal> {
    super::exchanges::fetch_coinbase_v2_spot(client, "USDC-USD").await
}

/// Fetch USDC/USD from all five depeg-monitoring sources.
pub async fn fetch_usdc_usd_sources(client: &Client) -> Vec<SourceSample> {
    let results = futures_util::future::join_all([
        async { ("kraken", fetch_kraken_spot(client, "USDCUSD").await) }.boxed(),
        async { ("bitstamp", fetch_bitstamp_spot(client, "usdcusd").await) }.boxed(),
        async { ("coinbase", fetch_coinbase_usdc(client).await) }.boxed(),
        async { ("gemini", fetch_gemini_spot(client, "usdcusd").await) }.boxed(),
        async { ("bitfinex", fetch_bitfinex_spot(client, "tUDCUSD").await) }.boxed(),
    ])
    .await;

    results
        .into_iter()
        .filter_map(|(name, price)| {
            price.map(|p| SourceSample {
                source: name.to_string(),
                price: p,
                denomination: Denomination::Native,
            })
        })
        .collect()
}

use futures_util::future::FutureExt;

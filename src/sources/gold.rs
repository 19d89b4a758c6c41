//! XAU/USD sources: three scraped traditional-bullion dealers plus the
//! PAXG tokenized-gold leg (USD-native and USDT-normalized exchanges).

use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::debug;

use super::exchanges::{
    fetch_coinbase_v2_spot, fetch_gemini_spot, fetch_kraken_spot, fetch_okx_spot,
};
use super::exchanges::fetch_binance_global_spot;
use super::{Denomination, SourceSample};

const SANITY_BAND: (Decimal, Decimal) = (Decimal::from_parts(1000, 0, 0, false, 0), Decimal::from_parts(20000, 0, 0, false, 0));

fn in_sanity_band(price: Decimal) -> bool {
    price > SANITY_BAND.0 && price < SANITY_BAND.1
}

/// Kitco's spot gold proxy endpoint, a comma-separated line of fields; the
/// USD spot price is field index 5.
pub async fn fetch_kitco(client: &Client) -> Option<Decimal> {
    let resp = client
        .get("https://proxy.kitco.com/getPM?symbol=AU&currency=USD")
        .send()
        .await
        .ok()?;
    let text = resp.text().await.ok()?;
    let parts: Vec<&str> = text.trim().split(',').collect();
    let price: Decimal = parts.get(5)?.parse().ok()?;
    if !in_sanity_band(price) {
        debug!(price = %price, "kitco price outside sanity band");
        return None;
    }
    Some(price)
}

/// JM Bullion's public chart page, scraped for the first dollar amount.
pub async fn fetch_jm_bullion(client: &Client) -> Option<Decimal> {
    let resp = client
        .get("https://www.jmbullion.com/charts/gold-price/")
        .header("User-Agent", "Mozilla/5.0")
        .send()
        .await
        .ok()?;
    let text = resp.text().await.ok()?;
    let re = Regex::new(r"\$[\d,]+\.\d+").ok()?;
    let m = re.find(&text)?;
    let price: Decimal = m.as_str().trim_start_matches('$').replace(',', "").parse().ok()?;
    if !in_sanity_band(price) {
        debug!(price = %price, "jmbullion price outside sanity band");
        return None;
    }
    Some(price)
}

/// GoldBroker's chart page, same scraping approach as JM Bullion.
pub async fn fetch_goldbroker(client: &Client) -> Option<Decimal> {
    let resp = client
        .get("https://www.goldbroker.com/charts/gold-price/usd")
        .header("User-Agent", "Mozilla/5.0")
        .send()
        .await
        .ok()?;
    let text = resp.text().await.ok()?;
    let re = Regex::new(r"\$[\d,]+\.\d+").ok()?;
    re.find_iter(&text)
        .filter_map(|m| m.as_str().trim_start_matches('$').replace(',', "").parse::<Decimal>().ok())
        .find(|p| in_sanity_band(*p))
}

/// Fetch all XAU/USD sources: traditional dealers and PAXG/USD exchanges
/// (native), plus PAXG/USDT exchanges (stablecoin-denominated, left
/// unconverted). The aggregator is responsible for sourcing the USDT/USD
/// rate, applying the divergence breaker, and converting the stablecoin
/// leg.
pub async fn fetch_xauusd_sources(client: &Client) -> Vec<SourceSample> {
    let traditional = futures_util::future::join_all([
        async { ("kitco", fetch_kitco(client).await) }.boxed(),
        async { ("jmbullion", fetch_jm_bullion(client).await) }.boxed(),
        async { ("goldbroker", fetch_goldbroker(client).await) }.boxed(),
    ])
    .await;

    let paxg_usd = futures_util::future::join_all([
        async { ("coinbase", fetch_coinbase_v2_spot(client, "PAXG-USD").await) }.boxed(),
        async { ("kraken", fetch_kraken_spot(client, "PAXGUSD").await) }.boxed(),
        async { ("gemini", fetch_gemini_spot(client, "paxgusd").await) }.boxed(),
    ])
    .await;

    let paxg_usdt = futures_util::future::join_all([
        async { ("binance", fetch_binance_global_spot(client, "PAXGUSDT").await) }.boxed(),
        async { ("okx", fetch_okx_spot(client, "PAXG-USDT").await) }.boxed(),
    ])
    .await;

    let mut out = Vec::new();
    for (name, price) in traditional {
        if let Some(p) = price {
            out.push(SourceSample { source: name.to_string(), price: p, denomination: Denomination::Native });
        }
    }
    for (name, price) in paxg_usd {
        if let Some(p) = price {
            out.push(SourceSample { source: name.to_string(), price: p, denomination: Denomination::Native });
        }
    }
    for (name, price) in paxg_usdt {
        if let Some(p) = price {
            out.push(SourceSample { source: name.to_string(), price: p, denomination: Denomination::Stablecoin });
        }
    }
    out
}

use futures_util::future::FutureExt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanity_band_excludes_out_of_range_prices() {
        assert!(!in_sanity_band(Decimal::new(999, 0)));
        assert!(!in_sanity_band(Decimal::new(20001, 0)));
        assert!(in_sanity_band(Decimal::new(2500, 0)));
    }
}

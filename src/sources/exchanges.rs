//! Spot and trade-tape fetchers for the centralized exchanges used across
//! the crypto pairs (BTC/USD, ETH/USD, SOL/USD, and the PAXG leg of
//! XAU/USD). Each function hits one exchange's public REST ticker/trades
//! endpoint and returns `None` on any failure.

use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use super::{Denomination, SourceSample, Trade};

async fn get_json(client: &Client, url: &str) -> Option<Value> {
    match client.get(url).send().await {
        Ok(resp) => match resp.json::<Value>().await {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(url, error = %e, "malformed json from source");
                None
            }
        },
        Err(e) => {
            debug!(url, error = %e, "source request failed");
            None
        }
    }
}

fn decimal_from_str(v: &Value) -> Option<Decimal> {
    v.as_str().and_then(|s| s.parse().ok())
}

fn decimal_from_number_or_str(v: &Value) -> Option<Decimal> {
    if let Some(s) = v.as_str() {
        return s.parse().ok();
    }
    if let Some(f) = v.as_f64() {
        return Decimal::try_from(f).ok();
    }
    None
}

/// Coinbase Exchange spot ticker, e.g. `BTC-USD`.
pub async fn fetch_coinbase_spot(client: &Client, product_id: &str) -> Option<Decimal> {
    let url = format!("https://api.exchange.coinbase.com/products/{product_id}/ticker");
    let json = get_json(client, &url).await?;
    decimal_from_str(json.get("price")?)
}

/// Coinbase's `v2/prices` endpoint, used for PAXG which isn't listed on the
/// exchange product ticker.
pub async fn fetch_coinbase_v2_spot(client: &Client, pair: &str) -> Option<Decimal> {
    let url = format!("https://api.coinbase.com/v2/prices/{pair}/spot");
    let json = get_json(client, &url).await?;
    decimal_from_str(json.get("data")?.get("amount")?)
}

/// Kraken public ticker. `pair` uses Kraken's own asset codes, e.g.
/// `XBTUSD`, `PAXGUSD`, `EURUSD`.
pub async fn fetch_kraken_spot(client: &Client, pair: &str) -> Option<Decimal> {
    let url = format!("https://api.kraken.com/0/public/Ticker?pair={pair}");
    let json = get_json(client, &url).await?;
    let result = json.get("result")?.as_object()?;
    let (_, entry) = result.iter().next()?;
    decimal_from_str(entry.get("c")?.get(0)?)
}

/// Bitstamp ticker, e.g. `btcusd`, `paxgusd`, `eurusd` (lowercase).
pub async fn fetch_bitstamp_spot(client: &Client, pair_lower: &str) -> Option<Decimal> {
    let url = format!("https://www.bitstamp.net/api/v2/ticker/{pair_lower}/");
    let json = get_json(client, &url).await?;
    decimal_from_str(json.get("last")?)
}

/// Gemini ticker, e.g. `btcusd`, `paxgusd` (lowercase).
pub async fn fetch_gemini_spot(client: &Client, pair_lower: &str) -> Option<Decimal> {
    let url = format!("https://api.gemini.com/v1/pubticker/{pair_lower}");
    let json = get_json(client, &url).await?;
    decimal_from_str(json.get("last")?)
}

/// Bitfinex ticker, e.g. `tBTCUSD`.
pub async fn fetch_bitfinex_spot(client: &Client, symbol: &str) -> Option<Decimal> {
    let url = format!("https://api-pub.bitfinex.com/v2/ticker/{symbol}");
    let json = get_json(client, &url).await?;
    let arr = json.as_array()?;
    decimal_from_number_or_str(arr.get(6)?)
}

/// Binance.US ticker, e.g. `BTCUSD`.
pub async fn fetch_binance_us_spot(client: &Client, symbol: &str) -> Option<Decimal> {
    let url = format!("https://api.binance.us/api/v3/ticker/price?symbol={symbol}");
    let json = get_json(client, &url).await?;
    decimal_from_str(json.get("price")?)
}

/// Binance global (via the public `data-api.binance.vision` mirror),
/// USDT-denominated, e.g. `BTCUSDT`.
pub async fn fetch_binance_global_spot(client: &Client, symbol: &str) -> Option<Decimal> {
    let url = format!("https://data-api.binance.vision/api/v3/ticker/price?symbol={symbol}");
    let json = get_json(client, &url).await?;
    decimal_from_str(json.get("price")?)
}

/// OKX ticker, USDT-denominated, e.g. `BTC-USDT`.
pub async fn fetch_okx_spot(client: &Client, inst_id: &str) -> Option<Decimal> {
    let url = format!("https://www.okx.com/api/v5/market/ticker?instId={inst_id}");
    let json = get_json(client, &url).await?;
    decimal_from_str(json.get("data")?.get(0)?.get("last")?)
}

/// Gate.io ticker, USDT-denominated, e.g. `btc_usdt`.
pub async fn fetch_gateio_spot(client: &Client, currency_pair: &str) -> Option<Decimal> {
    let url = format!("https://api.gateio.ws/api/v4/spot/tickers?currency_pair={currency_pair}");
    let json = get_json(client, &url).await?;
    let entry = json.as_array()?.first()?;
    decimal_from_str(entry.get("last")?)
}

/// USDT/USD rate used to normalize stablecoin-denominated samples, the
/// median of Kraken and Bitstamp quotes. Returns the sample count alongside
/// the rate so callers can enforce the two-source minimum before trusting
/// it for normalization.
pub async fn fetch_usdt_usd_rate(client: &Client) -> (Decimal, usize) {
    let mut rates = Vec::new();
    if let Some(r) = fetch_kraken_spot(client, "USDTUSD").await {
        rates.push(r);
    }
    if let Some(r) = fetch_bitstamp_spot(client, "usdtusd").await {
        rates.push(r);
    }
    let count = rates.len();
    if rates.is_empty() {
        return (Decimal::ONE, count);
    }
    rates.sort();
    let mid = rates.len() / 2;
    let median = if rates.len() % 2 == 0 {
        (rates[mid - 1] + rates[mid]) / Decimal::from(2)
    } else {
        rates[mid]
    };
    (median, count)
}

fn sample(source: &str, price: Decimal, denomination: Denomination) -> SourceSample {
    SourceSample {
        source: source.to_string(),
        price,
        denomination,
    }
}

/// Fetch every USD-native and USDT-normalized source for BTC/USD. USDT
/// legs are tagged `Denomination::Stablecoin`; the aggregator converts and
/// applies the divergence breaker.
pub async fn fetch_btcusd_sources(client: &Client) -> Vec<SourceSample> {
    let native = futures_util::future::join_all([
        async { ("coinbase", fetch_coinbase_spot(client, "BTC-USD").await) }.boxed(),
        async { ("kraken", fetch_kraken_spot(client, "XBTUSD").await) }.boxed(),
        async { ("bitstamp", fetch_bitstamp_spot(client, "btcusd").await) }.boxed(),
        async { ("gemini", fetch_gemini_spot(client, "btcusd").await) }.boxed(),
        async { ("bitfinex", fetch_bitfinex_spot(client, "tBTCUSD").await) }.boxed(),
        async { ("binance_us", fetch_binance_us_spot(client, "BTCUSD").await) }.boxed(),
    ])
    .await;

    let stable = futures_util::future::join_all([
        async { ("binance_global", fetch_binance_global_spot(client, "BTCUSDT").await) }
            .boxed(),
        async { ("okx", fetch_okx_spot(client, "BTC-USDT").await) }.boxed(),
        async { ("gateio", fetch_gateio_spot(client, "btc_usdt").await) }.boxed(),
    ])
    .await;

    let mut out = Vec::new();
    for (name, price) in native {
        if let Some(p) = price {
            out.push(sample(name, p, Denomination::Native));
        }
    }
    for (name, price) in stable {
        if let Some(p) = price {
            out.push(sample(name, p, Denomination::Stablecoin));
        }
    }
    out
}

/// Fetch every source for ETH/USD (same shape as BTC/USD, smaller roster).
pub async fn fetch_ethusd_sources(client: &Client) -> Vec<SourceSample> {
    let native = futures_util::future::join_all([
        async { ("coinbase", fetch_coinbase_spot(client, "ETH-USD").await) }.boxed(),
        async { ("kraken", fetch_kraken_spot(client, "ETHUSD").await) }.boxed(),
        async { ("bitstamp", fetch_bitstamp_spot(client, "ethusd").await) }.boxed(),
        async { ("binance_us", fetch_binance_us_spot(client, "ETHUSD").await) }.boxed(),
    ])
    .await;

    let stable = futures_util::future::join_all([async {
        ("okx", fetch_okx_spot(client, "ETH-USDT").await)
    }
    .boxed()])
    .await;

    let mut out = Vec::new();
    for (name, price) in native {
        if let Some(p) = price {
            out.push(sample(name, p, Denomination::Native));
        }
    }
    for (name, price) in stable {
        if let Some(p) = price {
            out.push(sample(name, p, Denomination::Stablecoin));
        }
    }
    out
}

/// Fetch every source for SOL/USD.
pub async fn fetch_solusd_sources(client: &Client) -> Vec<SourceSample> {
    let native = futures_util::future::join_all([
        async { ("coinbase", fetch_coinbase_spot(client, "SOL-USD").await) }.boxed(),
        async { ("kraken", fetch_kraken_spot(client, "SOLUSD").await) }.boxed(),
        async { ("bitstamp", fetch_bitstamp_spot(client, "solusd").await) }.boxed(),
        async { ("binance_us", fetch_binance_us_spot(client, "SOLUSD").await) }.boxed(),
    ])
    .await;

    let stable = futures_util::future::join_all([async {
        ("okx", fetch_okx_spot(client, "SOL-USDT").await)
    }
    .boxed()])
    .await;

    let mut out = Vec::new();
    for (name, price) in native {
        if let Some(p) = price {
            out.push(sample(name, p, Denomination::Native));
        }
    }
    for (name, price) in stable {
        if let Some(p) = price {
            out.push(sample(name, p, Denomination::Stablecoin));
        }
    }
    out
}

/// Trailing-5-minute-window VWAP samples for BTC/USD: Coinbase, Kraken,
/// Bitstamp, Gemini, Bitfinex (USD-native) plus OKX and Gate.io
/// (USDT-normalized).
pub async fn fetch_btcusd_vwap_sources(client: &Client) -> Vec<SourceSample> {
    let native = futures_util::future::join_all([
        async {
            (
                "coinbase",
                fetch_coinbase_trades(client, "BTC-USD").await,
                Denomination::Native,
            )
        }
        .boxed(),
        async {
            (
                "kraken",
                fetch_kraken_trades(client, "XBTUSD").await,
                Denomination::Native,
            )
        }
        .boxed(),
        async {
            (
                "bitstamp",
                fetch_bitstamp_trades(client, "btcusd").await,
                Denomination::Native,
            )
        }
        .boxed(),
        async {
            (
                "gemini",
                fetch_gemini_trades(client, "btcusd").await,
                Denomination::Native,
            )
        }
        .boxed(),
        async {
            (
                "bitfinex",
                fetch_bitfinex_trades(client, "tBTCUSD").await,
                Denomination::Native,
            )
        }
        .boxed(),
    ])
    .await;

    let stable = futures_util::future::join_all([
        async {
            (
                "okx",
                fetch_okx_trades(client, "BTC-USDT").await,
                Denomination::Stablecoin,
            )
        }
        .boxed(),
        async {
            (
                "gateio",
                fetch_gateio_trades(client, "btc_usdt").await,
                Denomination::Stablecoin,
            )
        }
        .boxed(),
    ])
    .await;

    native
        .into_iter()
        .chain(stable)
        .filter_map(|(name, trades, denom)| {
            let trades = trades?;
            super::compute_vwap(&trades).map(|price| sample(name, price, denom))
        })
        .collect()
}

async fn fetch_coinbase_trades(client: &Client, product_id: &str) -> Option<Vec<Trade>> {
    let url = format!("https://api.exchange.coinbase.com/products/{product_id}/trades?limit=200");
    let json = get_json(client, &url).await?;
    let now = chrono::Utc::now();
    let trades = json
        .as_array()?
        .iter()
        .filter_map(|t| {
            let price = decimal_from_str(t.get("price")?)?;
            let size = decimal_from_str(t.get("size")?)?;
            let time = t.get("time")?.as_str()?;
            let ts = chrono::DateTime::parse_from_rfc3339(time).ok()?;
            let age = (now - ts.with_timezone(&chrono::Utc)).num_seconds();
            Some(Trade { price, size, age_seconds: age })
        })
        .collect();
    Some(trades)
}

async fn fetch_kraken_trades(client: &Client, pair: &str) -> Option<Vec<Trade>> {
    let url = format!("https://api.kraken.com/0/public/Trades?pair={pair}");
    let json = get_json(client, &url).await?;
    let result = json.get("result")?.as_object()?;
    let (key, entries) = result.iter().find(|(k, _)| *k != "last")?;
    let _ = key;
    let now_secs = chrono::Utc::now().timestamp();
    let trades = entries
        .as_array()?
        .iter()
        .filter_map(|t| {
            let arr = t.as_array()?;
            let price = decimal_from_str(arr.get(0)?)?;
            let volume = decimal_from_str(arr.get(1)?)?;
            let time = arr.get(2)?.as_f64()? as i64;
            Some(Trade {
                price,
                size: volume,
                age_seconds: now_secs - time,
            })
        })
        .collect();
    Some(trades)
}

async fn fetch_bitstamp_trades(client: &Client, pair_lower: &str) -> Option<Vec<Trade>> {
    let url = format!("https://www.bitstamp.net/api/v2/transactions/{pair_lower}/?time=minute");
    let json = get_json(client, &url).await?;
    let now_secs = chrono::Utc::now().timestamp();
    let trades = json
        .as_array()?
        .iter()
        .filter_map(|t| {
            let price = decimal_from_str(t.get("price")?)?;
            let amount = decimal_from_str(t.get("amount")?)?;
            let date = t.get("date")?.as_str()?.parse::<i64>().ok()?;
            Some(Trade { price, size: amount, age_seconds: now_secs - date })
        })
        .collect();
    Some(trades)
}

async fn fetch_gemini_trades(client: &Client, pair_lower: &str) -> Option<Vec<Trade>> {
    let url = format!("https://api.gemini.com/v1/trades/{pair_lower}");
    let json = get_json(client, &url).await?;
    let now_secs = chrono::Utc::now().timestamp();
    let trades = json
        .as_array()?
        .iter()
        .filter_map(|t| {
            let price = decimal_from_str(t.get("price")?)?;
            let amount = decimal_from_str(t.get("amount")?)?;
            let timestamp = t.get("timestamp")?.as_i64()?;
            Some(Trade { price, size: amount, age_seconds: now_secs - timestamp })
        })
        .collect();
    Some(trades)
}

async fn fetch_bitfinex_trades(client: &Client, symbol: &str) -> Option<Vec<Trade>> {
    let url = format!("https://api-pub.bitfinex.com/v2/trades/{symbol}/hist?limit=250");
    let json = get_json(client, &url).await?;
    let now_ms = chrono::Utc::now().timestamp_millis();
    let trades = json
        .as_array()?
        .iter()
        .filter_map(|t| {
            let arr = t.as_array()?;
            let mts = arr.get(1)?.as_i64()?;
            let amount = decimal_from_number_or_str(arr.get(2)?)?;
            let price = decimal_from_number_or_str(arr.get(3)?)?;
            Some(Trade {
                price,
                size: amount.abs(),
                age_seconds: (now_ms - mts) / 1000,
            })
        })
        .collect();
    Some(trades)
}

async fn fetch_okx_trades(client: &Client, inst_id: &str) -> Option<Vec<Trade>> {
    let url = format!("https://www.okx.com/api/v5/market/trades?instId={inst_id}&limit=500");
    let json = get_json(client, &url).await?;
    let now_ms = chrono::Utc::now().timestamp_millis();
    let trades = json
        .get("data")?
        .as_array()?
        .iter()
        .filter_map(|t| {
            let price = decimal_from_str(t.get("px")?)?;
            let size = decimal_from_str(t.get("sz")?)?;
            let ts = t.get("ts")?.as_str()?.parse::<i64>().ok()?;
            Some(Trade { price, size, age_seconds: (now_ms - ts) / 1000 })
        })
        .collect();
    Some(trades)
}

async fn fetch_gateio_trades(client: &Client, currency_pair: &str) -> Option<Vec<Trade>> {
    let url = format!("https://api.gateio.ws/api/v4/spot/trades?currency_pair={currency_pair}&limit=500");
    let json = get_json(client, &url).await?;
    let now_secs = chrono::Utc::now().timestamp();
    let trades = json
        .as_array()?
        .iter()
        .filter_map(|t| {
            let price = decimal_from_str(t.get("price")?)?;
            let amount = decimal_from_str(t.get("amount")?)?;
            let create_time = t.get("create_time")?.as_str()?.parse::<i64>().ok()?;
            Some(Trade { price, size: amount, age_seconds: now_secs - create_time })
        })
        .collect();
    Some(trades)
}

use futures_util::future::FutureExt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_pair_json_extraction_shapes_are_consistent() {
        let v: Value = serde_json::json!({"price": "65432.10"});
        assert_eq!(decimal_from_str(v.get("price").unwrap()), Some(Decimal::new(6543210, 2)));
    }
}

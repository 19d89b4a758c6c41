//! EUR/USD sources drawn from central bank and statistics-office publication
//! feeds, each reporting a EUR cross through a third currency that this
//! module divides out. Two exchange sources are folded in alongside them.

use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use super::{Denomination, SourceSample};
use super::exchanges::{fetch_bitstamp_spot, fetch_kraken_spot};

async fn get_text(client: &Client, url: &str) -> Option<String> {
    let resp = client.get(url).header("User-Agent", "Mozilla/5.0").send().await.ok()?;
    resp.text().await.ok()
}

async fn get_json(client: &Client, url: &str) -> Option<Value> {
    let resp = client.get(url).send().await.ok()?;
    resp.json::<Value>().await.ok()
}

/// European Central Bank reference rate, via the Frankfurter mirror.
pub async fn fetch_ecb(client: &Client) -> Option<Decimal> {
    let json = get_json(client, "https://api.frankfurter.dev/v1/latest?symbols=USD").await?;
    json.get("rates")?.get("USD")?.as_str()?.parse().ok()
        .or_else(|| json.get("rates")?.get("USD")?.as_f64().and_then(|f| Decimal::try_from(f).ok()))
}

/// Bank of Canada cross: EUR/CAD divided by USD/CAD.
pub async fn fetch_bank_of_canada(client: &Client) -> Option<Decimal> {
    let eurcad = get_json(
        client,
        "https://www.bankofcanada.ca/valet/observations/FXEURCAD/json?recent=1",
    )
    .await?;
    let eurcad_rate: Decimal = eurcad
        .get("observations")?
        .get(0)?
        .get("FXEURCAD")?
        .get("v")?
        .as_str()?
        .parse()
        .ok()?;

    let usdcad = get_json(
        client,
        "https://www.bankofcanada.ca/valet/observations/FXUSDCAD/json?recent=1",
    )
    .await?;
    let usdcad_rate: Decimal = usdcad
        .get("observations")?
        .get(0)?
        .get("FXUSDCAD")?
        .get("v")?
        .as_str()?
        .parse()
        .ok()?;

    if usdcad_rate.is_zero() {
        return None;
    }
    Some(eurcad_rate / usdcad_rate)
}

/// Reserve Bank of Australia cross, parsed out of their exchange-rate RSS
/// feed: AUD/USD divided by AUD/EUR.
pub async fn fetch_rba(client: &Client) -> Option<Decimal> {
    let xml = get_text(client, "https://www.rba.gov.au/rss/rss-cb-exchange-rates.xml").await?;
    let usd_re = Regex::new(r"AU:\s+([\d.]+)\s+USD\s+=\s+1\s+AUD").ok()?;
    let eur_re = Regex::new(r"AU:\s+([\d.]+)\s+EUR\s+=\s+1\s+AUD").ok()?;
    let aud_usd: Decimal = usd_re.captures(&xml)?.get(1)?.as_str().parse().ok()?;
    let aud_eur: Decimal = eur_re.captures(&xml)?.get(1)?.as_str().parse().ok()?;
    if aud_eur.is_zero() {
        return None;
    }
    Some(aud_usd / aud_eur)
}

/// Norges Bank cross: EUR/NOK divided by USD/NOK, via their SDMX-JSON API.
pub async fn fetch_norges_bank(client: &Client) -> Option<Decimal> {
    let eurnok_doc = get_json(
        client,
        "https://data.norges-bank.no/api/data/EXR/B.EUR.NOK.SP?format=sdmx-json&lastNObservations=1",
    )
    .await?;
    let eurnok = extract_last_sdmx_observation(&eurnok_doc)?;

    let usdnok_doc = get_json(
        client,
        "https://data.norges-bank.no/api/data/EXR/B.USD.NOK.SP?format=sdmx-json&lastNObservations=1",
    )
    .await?;
    let usdnok = extract_last_sdmx_observation(&usdnok_doc)?;

    if usdnok.is_zero() {
        return None;
    }
    Some(eurnok / usdnok)
}

fn extract_last_sdmx_observation(doc: &Value) -> Option<Decimal> {
    let series = doc
        .get("data")?
        .get("dataSets")?
        .get(0)?
        .get("series")?
        .get("0:0:0:0")?
        .get("observations")?
        .as_object()?;
    let (_, last) = series.iter().last()?;
    last.get(0)?.as_f64().and_then(|f| Decimal::try_from(f).ok())
}

/// Czech National Bank daily fixing table: EUR/CZK divided by USD/CZK,
/// parsed out of their pipe-delimited text export.
pub async fn fetch_cnb(client: &Client) -> Option<Decimal> {
    let text = get_text(
        client,
        "https://www.cnb.cz/en/financial-markets/foreign-exchange-market/central-bank-exchange-rate-fixing/central-bank-exchange-rate-fixing/daily.txt",
    )
    .await?;
    let mut eur_rate = None;
    let mut usd_rate = None;
    for line in text.lines().skip(2) {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 5 {
            continue;
        }
        let code = parts[3].trim();
        let amount: Decimal = match parts[2].trim().parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let rate: Decimal = match parts[4].trim().parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if amount.is_zero() {
            continue;
        }
        match code {
            "EUR" => eur_rate = Some(rate / amount),
            "USD" => usd_rate = Some(rate / amount),
            _ => {}
        }
    }
    let (eur, usd) = (eur_rate?, usd_rate?);
    if usd.is_zero() {
        return None;
    }
    Some(eur / usd)
}

/// Fetch all seven EUR/USD sources: five institutional crosses plus two
/// exchange quotes.
pub async fn fetch_eurusd_sources(client: &Client) -> Vec<SourceSample> {
    let results = futures_util::future::join_all([
        async { ("ecb", fetch_ecb(client).await) }.boxed(),
        async { ("bankofcanada", fetch_bank_of_canada(client).await) }.boxed(),
        async { ("rba", fetch_rba(client).await) }.boxed(),
        async { ("norgesbank", fetch_norges_bank(client).await) }.boxed(),
        async { ("cnb", fetch_cnb(client).await) }.boxed(),
        async { ("kraken", fetch_kraken_spot(client, "EURUSD").await) }.boxed(),
        async { ("bitstamp", fetch_bitstamp_spot(client, "eurusd").await) }.boxed(),
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
        .inspect(|s| debug!(source = %s.source, price = %s.price, "eurusd source ok"))
        .collect()
}

use futures_util::future::FutureExt;

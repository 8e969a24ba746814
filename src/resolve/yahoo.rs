//! Yahoo Finance backed implementations of the resolver and price-history
//! service contracts.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ResolverConfig;

use super::{NameSearchService, PriceHistoryService, ProfileService, SearchHit};

// Yahoo rejects default client agents
const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct YahooClient {
    client: reqwest::Client,
    config: ResolverConfig,
}

impl YahooClient {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config: config.clone() })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP {} for {}", status, url));
        }

        resp.json::<Value>()
            .await
            .with_context(|| format!("Malformed JSON from {}", url))
    }
}

// ── Name search ───────────────────────────────────────────────────────────────

#[async_trait]
impl NameSearchService for YahooClient {
    async fn search_by_name(&self, query: &str) -> Result<Vec<SearchHit>> {
        let url = Url::parse_with_params(
            &self.config.search_url,
            &[("q", query), ("quotesCount", "10"), ("newsCount", "0")],
        )
        .context("Bad search URL")?;

        let data = self.get_json(url.as_str()).await?;

        let quotes = data
            .get("quotes")
            .and_then(|q| q.as_array())
            .cloned()
            .unwrap_or_default();

        let hits = quotes
            .iter()
            .filter_map(|q| {
                let symbol = q.get("symbol")?.as_str()?.to_string();
                let short_name = q
                    .get("shortname")
                    .or_else(|| q.get("longname"))
                    .and_then(|n| n.as_str())
                    .unwrap_or(&symbol)
                    .to_string();
                let quote_type = q
                    .get("quoteType")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string();
                Some(SearchHit { symbol, short_name, quote_type })
            })
            .collect();

        Ok(hits)
    }
}

// ── Profile / ISIN ────────────────────────────────────────────────────────────

#[async_trait]
impl ProfileService for YahooClient {
    async fn isin_for(&self, ticker: &str) -> Result<String> {
        let url = self.config.profile_url.replace("{ticker}", ticker);
        let data = self.get_json(&url).await?;

        // A successful response without the field is still a service
        // failure; the caller degrades it to "NA" for this one lookup.
        find_isin(&data, 0)
            .ok_or_else(|| anyhow!("No isin field in profile response for {}", ticker))
    }
}

/// Shallow scan for an "isin" string field anywhere in the response object.
/// Profile responses nest per-module; the exact path is not contractual.
fn find_isin(value: &Value, depth: usize) -> Option<String> {
    if depth > 4 {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(isin) = map.get("isin").and_then(|v| v.as_str()) {
                return Some(isin.to_string());
            }
            map.values().find_map(|v| find_isin(v, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|v| find_isin(v, depth + 1)),
        _ => None,
    }
}

// ── Price history ─────────────────────────────────────────────────────────────

#[async_trait]
impl PriceHistoryService for YahooClient {
    async fn open_close(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<(f64, f64)>> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        let period2 = end
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);

        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            self.config.chart_url, ticker, period1, period2
        );

        let data = self.get_json(&url).await?;

        let quote = data
            .pointer("/chart/result/0/indicators/quote/0")
            .cloned()
            .unwrap_or(Value::Null);

        let open = quote.pointer("/open/0").and_then(|v| v.as_f64());
        let close = quote.pointer("/close/0").and_then(|v| v.as_f64());

        match (open, close) {
            (Some(o), Some(c)) => Ok(Some((o, c))),
            _ => Ok(None),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

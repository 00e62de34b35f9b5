use crate::core::sources::{Price, PriceFeed, split_symbol};
use crate::providers::util::{RetryPolicy, with_retry};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
    currency: Option<String>,
}

/// Latest prices and exchange rates from the Yahoo Finance chart API.
pub struct YahooPriceFeed {
    base_url: String,
    base_currency: String,
    /// Ticker suffix per symbol namespace.
    exchanges: BTreeMap<String, String>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl YahooPriceFeed {
    pub fn new(
        base_url: &str,
        base_currency: &str,
        exchanges: BTreeMap<String, String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("asset-allocation/0.1")
            .build()?;
        Ok(YahooPriceFeed {
            base_url: base_url.trim_end_matches('/').to_string(),
            base_currency: base_currency.to_uppercase(),
            exchanges,
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Yahoo ticker for a namespaced symbol: `ASX:VHY` becomes `VHY.AX` when `ASX` maps to `.AX`.
    /// Namespaces without a mapping are dropped, so `NYSEARCA:VEU` becomes `VEU`.
    pub fn ticker(&self, symbol: &str) -> String {
        match split_symbol(symbol) {
            (Some(namespace), mnemonic) => match self.exchanges.get(namespace) {
                Some(suffix) => format!("{mnemonic}{suffix}"),
                None => mnemonic.to_string(),
            },
            (None, mnemonic) => mnemonic.to_string(),
        }
    }

    /// Regular market price and currency for `ticker`, `None` when Yahoo does not know it.
    async fn quote(&self, ticker: &str) -> Result<Option<(Decimal, Option<String>)>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        debug!("Requesting quote from {}", url);

        let response = with_retry(|| self.client.get(&url).send(), self.retry)
            .await
            .map_err(|e| anyhow!("Request error: {} for ticker: {}", e, ticker))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(ticker, "Yahoo has no quote");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for ticker: {}",
                response.status(),
                ticker
            ));
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", ticker, e))?;

        let Some(item) = data.chart.result.and_then(|items| items.into_iter().next()) else {
            return Ok(None);
        };
        // The float's shortest rendering is what Yahoo displays.
        let price: Decimal = item
            .meta
            .regular_market_price
            .to_string()
            .parse()
            .map_err(|e| anyhow!("Invalid price for {}: {}", ticker, e))?;
        Ok(Some((price, item.meta.currency)))
    }
}

#[async_trait]
impl PriceFeed for YahooPriceFeed {
    #[instrument(name = "YahooPriceFetch", skip(self), fields(symbol = %symbol))]
    async fn latest_price(&self, symbol: &str) -> Result<Option<Price>> {
        let ticker = self.ticker(symbol);
        Ok(self.quote(&ticker).await?.map(|(value, currency)| Price {
            value,
            currency: currency.unwrap_or_else(|| self.base_currency.clone()),
        }))
    }

    #[instrument(name = "YahooRateFetch", skip(self), fields(currency = %currency))]
    async fn latest_rate(&self, currency: &str) -> Result<Option<Decimal>> {
        let pair = format!("{}{}=X", currency.to_uppercase(), self.base_currency);
        Ok(self.quote(&pair).await?.map(|(rate, _)| rate))
    }
}

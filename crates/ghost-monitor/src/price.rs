//! Price sources.
//!
//! The monitor only needs `feed id -> current integer price`. Prices are in
//! the feed's smallest unit (the mantissa), the same unit trigger prices use.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ghost_core::{BoxFuture, FeedId};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MonitorError, MonitorResult};

pub trait PriceSource: Send + Sync {
    fn get_price(&self, feed_id: FeedId) -> BoxFuture<'_, MonitorResult<u64>>;
}

pub type DynPriceSource = Arc<dyn PriceSource>;

// ============================================================================
// StaticPriceSource
// ============================================================================

/// Settable in-memory price table.
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    prices: RwLock<HashMap<FeedId, u64>>,
}

impl StaticPriceSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prices(prices: HashMap<FeedId, u64>) -> Self {
        Self {
            prices: RwLock::new(prices),
        }
    }

    pub fn set_price(&self, feed_id: FeedId, price: u64) {
        self.prices.write().insert(feed_id, price);
    }

    pub fn remove_price(&self, feed_id: &FeedId) {
        self.prices.write().remove(feed_id);
    }
}

impl PriceSource for StaticPriceSource {
    fn get_price(&self, feed_id: FeedId) -> BoxFuture<'_, MonitorResult<u64>> {
        let price = self.prices.read().get(&feed_id).copied();
        Box::pin(async move {
            price.ok_or_else(|| MonitorError::PriceFetch(format!("no price for feed {feed_id}")))
        })
    }
}

// ============================================================================
// HermesPriceSource
// ============================================================================

#[derive(Debug, Deserialize)]
struct HermesResponse {
    #[serde(default)]
    parsed: Vec<HermesParsed>,
}

#[derive(Debug, Deserialize)]
struct HermesParsed {
    price: HermesPrice,
}

#[derive(Debug, Deserialize)]
struct HermesPrice {
    /// Mantissa as a decimal string.
    price: String,
}

/// Latest-price lookups against a Hermes HTTP endpoint.
pub struct HermesPriceSource {
    client: Client,
    base_url: String,
}

impl HermesPriceSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, feed_id: FeedId) -> MonitorResult<u64> {
        let url = format!("{}/v2/updates/price/latest", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("ids[]", feed_id.to_hex())])
            .send()
            .await
            .map_err(|e| MonitorError::PriceFetch(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::PriceFetch(format!("HTTP {status}: {body}")));
        }

        let body: HermesResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::PriceFetch(format!("Failed to parse response: {e}")))?;

        let price = parse_mantissa(&body)?;
        debug!(feed = %feed_id.short(), price, "Hermes price fetched");
        Ok(price)
    }
}

fn parse_mantissa(body: &HermesResponse) -> MonitorResult<u64> {
    let entry = body
        .parsed
        .first()
        .ok_or_else(|| MonitorError::PriceFetch("empty parsed price list".to_string()))?;
    let mantissa: i64 = entry
        .price
        .price
        .parse()
        .map_err(|e| MonitorError::PriceFetch(format!("bad price '{}': {e}", entry.price.price)))?;
    u64::try_from(mantissa)
        .map_err(|_| MonitorError::PriceFetch(format!("negative price {mantissa}")))
}

impl PriceSource for HermesPriceSource {
    fn get_price(&self, feed_id: FeedId) -> BoxFuture<'_, MonitorResult<u64>> {
        Box::pin(self.fetch(feed_id))
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    #[default]
    Static,
    Hermes,
}

/// `[price]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    #[serde(default)]
    pub mode: PriceMode,
    #[serde(default = "default_hermes_url")]
    pub hermes_url: String,
    /// Initial table for static mode, keyed by feed id hex.
    #[serde(default)]
    pub static_prices: HashMap<FeedId, u64>,
}

fn default_hermes_url() -> String {
    "https://hermes.pyth.network".to_string()
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            mode: PriceMode::default(),
            hermes_url: default_hermes_url(),
            static_prices: HashMap::new(),
        }
    }
}

impl PriceConfig {
    /// Build the configured source. Static mode also returns the concrete
    /// handle so callers can move prices.
    pub fn build(
        &self,
        timeout: Duration,
    ) -> MonitorResult<(DynPriceSource, Option<Arc<StaticPriceSource>>)> {
        match self.mode {
            PriceMode::Static => {
                let handle = Arc::new(StaticPriceSource::with_prices(self.static_prices.clone()));
                let source: DynPriceSource = handle.clone();
                Ok((source, Some(handle)))
            }
            PriceMode::Hermes => {
                let source: DynPriceSource =
                    Arc::new(HermesPriceSource::new(&self.hermes_url, timeout)?);
                Ok((source, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source() {
        let feed = FeedId::new([1; 32]);
        let source = StaticPriceSource::new();
        assert!(matches!(
            source.get_price(feed).await,
            Err(MonitorError::PriceFetch(_))
        ));

        source.set_price(feed, 180_000_000);
        assert_eq!(source.get_price(feed).await.unwrap(), 180_000_000);

        source.set_price(feed, 179_000_000);
        assert_eq!(source.get_price(feed).await.unwrap(), 179_000_000);

        source.remove_price(&feed);
        assert!(source.get_price(feed).await.is_err());
    }

    #[test]
    fn test_parse_hermes_body() {
        let body: HermesResponse = serde_json::from_str(
            r#"{"binary":{"encoding":"hex","data":[]},
                "parsed":[{"id":"ef","price":{"price":"17934500000","conf":"1","expo":-8,"publish_time":1}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_mantissa(&body).unwrap(), 17_934_500_000);
    }

    #[test]
    fn test_parse_hermes_rejects_negative_and_empty() {
        let neg: HermesResponse =
            serde_json::from_str(r#"{"parsed":[{"price":{"price":"-5"}}]}"#).unwrap();
        assert!(parse_mantissa(&neg).is_err());

        let empty: HermesResponse = serde_json::from_str(r#"{"parsed":[]}"#).unwrap();
        assert!(parse_mantissa(&empty).is_err());
    }

    #[test]
    fn test_price_config_static_table() {
        let feed_hex = "ef".repeat(32);
        let config: PriceConfig = toml::from_str(&format!(
            "mode = \"static\"\n[static_prices]\n\"{feed_hex}\" = 180000000\n"
        ))
        .unwrap();
        assert_eq!(config.mode, PriceMode::Static);
        assert_eq!(config.static_prices[&FeedId::new([0xef; 32])], 180_000_000);
    }

    #[tokio::test]
    async fn test_build_static() {
        let mut config = PriceConfig::default();
        config.static_prices.insert(FeedId::new([2; 32]), 42);
        let (source, handle) = config.build(Duration::from_secs(1)).unwrap();
        assert!(handle.is_some());
        assert_eq!(source.get_price(FeedId::new([2; 32])).await.unwrap(), 42);
    }
}

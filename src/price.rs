use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use crate::fetch::{fetch_with_fallback, FetchError, Fetched};
use crate::http::ApiClient;

const COINGECKO_SIMPLE_PRICE: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Symbol -> (CoinGecko id, fallback USD price).
const KNOWN_TOKENS: &[(&str, &str, f64)] = &[
    ("ETH", "ethereum", 2000.0),
    ("WETH", "weth", 2000.0),
    ("USDC", "usd-coin", 1.0),
    ("USDC.E", "usd-coin", 1.0),
    ("USDT", "tether", 1.0),
    ("DAI", "dai", 1.0),
    ("WBTC", "wrapped-bitcoin", 60000.0),
    ("MATIC", "matic-network", 0.7),
    ("POL", "polygon-ecosystem-token", 0.7),
];

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
}

pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let upper = symbol.to_ascii_uppercase();
    KNOWN_TOKENS
        .iter()
        .find(|(s, _, _)| *s == upper)
        .map(|(_, id, _)| *id)
}

pub fn fallback_price(symbol: &str) -> f64 {
    let upper = symbol.to_ascii_uppercase();
    KNOWN_TOKENS
        .iter()
        .find(|(s, _, _)| *s == upper)
        .map(|(_, _, p)| *p)
        .unwrap_or(0.0)
}

pub fn simple_price_url(ids: &[&str]) -> Result<String, FetchError> {
    let url = Url::parse_with_params(
        COINGECKO_SIMPLE_PRICE,
        &[("ids", ids.join(",")), ("vs_currencies", "usd".to_string())],
    )?;
    Ok(url.to_string())
}

pub struct PriceService<'a> {
    client: &'a ApiClient,
}

impl<'a> PriceService<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn usd_price(&self, coingecko_id: &str) -> Result<f64, FetchError> {
        let url = simple_price_url(&[coingecko_id])?;
        let body: HashMap<String, SimplePrice> = self.client.get_json(&url).await?;
        body.get(coingecko_id)
            .and_then(|p| p.usd)
            .ok_or(FetchError::Missing("usd"))
    }

    /// Price for a token symbol, falling back to the hardcoded table.
    pub async fn price_for_symbol(&self, symbol: &str) -> Fetched<f64> {
        let fallback = fallback_price(symbol);
        match coingecko_id(symbol) {
            Some(id) => fetch_with_fallback(symbol, self.usd_price(id), fallback).await,
            None => {
                log::warn!(
                    "⚠️ [PriceService::price_for_symbol] no source for {symbol}, using {fallback}"
                );
                Fetched::Fallback {
                    value: fallback,
                    error: FetchError::Missing("price source"),
                }
            }
        }
    }

    pub async fn eth_price(&self) -> Fetched<f64> {
        self.price_for_symbol("ETH").await
    }

    /// Resolves several symbols sequentially, sleeping between requests.
    pub async fn prices_for(&self, symbols: &[String]) -> HashMap<String, Fetched<f64>> {
        let mut prices = HashMap::new();
        for symbol in symbols {
            let key = symbol.to_ascii_uppercase();
            if prices.contains_key(&key) {
                continue;
            }
            let price = self.price_for_symbol(&key).await;
            prices.insert(key, price);
            self.client.throttle().await;
        }
        prices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(coingecko_id("weth"), Some("weth"));
        assert_eq!(coingecko_id("Usdc"), Some("usd-coin"));
        assert_eq!(coingecko_id("PEPE"), None);
        assert_eq!(fallback_price("usdt"), 1.0);
        assert_eq!(fallback_price("PEPE"), 0.0);
    }

    #[tokio::test]
    async fn test_symbol_without_source_falls_back() {
        let client = ApiClient::new(&RunConfig::default()).unwrap();
        let price = PriceService::new(&client).price_for_symbol("PEPE").await;
        assert!(price.is_fallback());
        assert_eq!(*price.value(), 0.0);
        assert_eq!(price.marker(), "⚠️ ");
        assert!(matches!(
            price.into_result(),
            Err(FetchError::Missing("price source"))
        ));
    }

    #[test]
    fn test_simple_price_url() {
        let url = simple_price_url(&["ethereum", "usd-coin"]).unwrap();
        assert_eq!(
            url,
            "https://api.coingecko.com/api/v3/simple/price?ids=ethereum%2Cusd-coin&vs_currencies=usd"
        );
    }
}

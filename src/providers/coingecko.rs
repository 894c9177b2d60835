use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::price::LivePriceProvider;

// CoinGeckoProvider implementation for LivePriceProvider
pub struct CoinGeckoProvider {
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str) -> Self {
        CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SimplePriceResponse {
    bitcoin: CoinQuote,
}

#[derive(Deserialize, Debug)]
struct CoinQuote {
    usd: f64,
}

#[async_trait]
impl LivePriceProvider for CoinGeckoProvider {
    #[instrument(name = "CoinGeckoPriceFetch", skip(self))]
    async fn fetch_current_price(&self) -> Result<f64> {
        let url = format!(
            "{}/api/v3/simple/price?ids=bitcoin&vs_currencies=usd",
            self.base_url
        );
        debug!("Requesting current price from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("loanworth/0.1")
            .build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} for bitcoin price", response.status()));
        }

        let text = response.text().await?;
        let data: SimplePriceResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for bitcoin price: {}", e))?;

        debug!(price = data.bitcoin.usd, "Received CoinGecko quote");
        Ok(data.bitcoin.usd)
    }
}

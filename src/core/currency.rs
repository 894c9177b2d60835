//! Currency normalization with USD as the pivot.

use super::error::EngineError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Currencies a loan can be denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Czk,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Czk];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Czk => "CZK",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "CZK" => Ok(Currency::Czk),
            _ => Err(EngineError::UnknownCurrency(s.trim().to_string())),
        }
    }
}

/// Supplies "units of currency per 1 USD" keyed by ISO code.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Name used when reporting the provider as unavailable.
    fn name(&self) -> &str;

    async fn fetch_rates(&self) -> Result<HashMap<String, f64>>;
}

/// Read-only snapshot of exchange rates against USD.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRateTable {
    rates: HashMap<Currency, f64>,
}

impl ExchangeRateTable {
    /// Static table used whenever the rate provider cannot be reached.
    pub fn fallback() -> Self {
        Self {
            rates: HashMap::from([(Currency::Eur, 0.85), (Currency::Czk, 21.5)]),
        }
    }

    /// Keeps supported codes with a usable rate, drops everything else.
    pub fn from_codes(raw: &HashMap<String, f64>) -> Self {
        let mut rates = HashMap::new();
        for (code, rate) in raw {
            match code.parse::<Currency>() {
                Ok(Currency::Usd) => {}
                Ok(currency) if rate.is_finite() && *rate > 0.0 => {
                    rates.insert(currency, *rate);
                }
                Ok(currency) => debug!(%currency, rate, "Ignoring unusable rate"),
                Err(_) => {}
            }
        }
        Self { rates }
    }

    /// Fetches rates without any fallback.
    pub async fn fetch(provider: &dyn RateProvider) -> Result<Self, EngineError> {
        let raw = provider.fetch_rates().await.map_err(|e| {
            debug!(provider = provider.name(), error = %e, "Rate fetch failed");
            EngineError::ProviderUnavailable(provider.name().to_string())
        })?;
        Ok(Self::from_codes(&raw))
    }

    /// Fetches rates, recovering from provider failure with the static table.
    pub async fn load(provider: Option<&dyn RateProvider>) -> Self {
        let Some(provider) = provider else {
            info!("No rate provider configured, using static exchange rates");
            return Self::fallback();
        };
        match Self::fetch(provider).await {
            Ok(table) => {
                info!(provider = provider.name(), "Loaded exchange rates");
                table.or_fallback()
            }
            Err(e) => {
                warn!(error = %e, "Falling back to static exchange rates");
                Self::fallback()
            }
        }
    }

    /// Fills every supported currency the provider left out with its static
    /// rate.
    fn or_fallback(mut self) -> Self {
        let fallback = Self::fallback();
        for currency in Currency::ALL {
            if currency == Currency::Usd || self.rates.contains_key(&currency) {
                continue;
            }
            if let Some(rate) = fallback.rates.get(&currency) {
                warn!(%currency, rate, "Provider has no rate, using static rate");
                self.rates.insert(currency, *rate);
            }
        }
        self
    }

    /// Units of `currency` per 1 USD.
    pub fn rate(&self, currency: Currency) -> Result<f64, EngineError> {
        if currency == Currency::Usd {
            return Ok(1.0);
        }
        self.rates
            .get(&currency)
            .copied()
            .ok_or_else(|| EngineError::UnknownCurrency(currency.code().to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    rates: Arc<ExchangeRateTable>,
}

impl CurrencyConverter {
    pub fn new(rates: Arc<ExchangeRateTable>) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &ExchangeRateTable {
        &self.rates
    }

    /// Fails fast when `currency` has no loaded rate.
    pub fn ensure_supported(&self, currency: Currency) -> Result<(), EngineError> {
        self.rates.rate(currency).map(|_| ())
    }

    pub fn to_usd(&self, amount: f64, currency: Currency) -> Result<f64, EngineError> {
        if currency == Currency::Usd {
            return Ok(amount);
        }
        Ok(amount / self.rates.rate(currency)?)
    }

    pub fn from_usd(&self, amount: f64, currency: Currency) -> Result<f64, EngineError> {
        if currency == Currency::Usd {
            return Ok(amount);
        }
        Ok(amount * self.rates.rate(currency)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct MockRateProvider {
        rates: Option<HashMap<String, f64>>,
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
            self.rates.clone().ok_or_else(|| anyhow!("offline"))
        }
    }

    fn converter() -> CurrencyConverter {
        CurrencyConverter::new(Arc::new(ExchangeRateTable::fallback()))
    }

    #[test]
    fn test_usd_is_identity() {
        let c = converter();
        assert_eq!(c.to_usd(1234.5, Currency::Usd).unwrap(), 1234.5);
        assert_eq!(c.from_usd(1234.5, Currency::Usd).unwrap(), 1234.5);
    }

    #[test]
    fn test_conversion_uses_units_per_usd() {
        let c = converter();
        assert!((c.to_usd(850.0, Currency::Eur).unwrap() - 1000.0).abs() < 1e-9);
        assert!((c.from_usd(100.0, Currency::Czk).unwrap() - 2150.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_law() {
        let c = converter();
        for currency in [Currency::Eur, Currency::Czk] {
            for amount in [0.01, 1.0, 5000.0, 123456.789, 1e9] {
                let usd = c.to_usd(amount, currency).unwrap();
                let back = c.from_usd(usd, currency).unwrap();
                assert!(
                    (back - amount).abs() <= amount * 1e-12,
                    "{currency}: {amount} -> {back}"
                );
            }
        }
    }

    #[test]
    fn test_unknown_currency_code_is_rejected() {
        assert_eq!(
            "GBP".parse::<Currency>(),
            Err(EngineError::UnknownCurrency("GBP".to_string()))
        );
        assert_eq!("eur".parse::<Currency>(), Ok(Currency::Eur));
    }

    #[test]
    fn test_missing_rate_is_unknown_currency() {
        let table = ExchangeRateTable::from_codes(&HashMap::from([("EUR".to_string(), 0.9)]));
        let c = CurrencyConverter::new(Arc::new(table));

        assert_eq!(
            c.to_usd(100.0, Currency::Czk),
            Err(EngineError::UnknownCurrency("CZK".to_string()))
        );
        assert_eq!(
            c.from_usd(100.0, Currency::Czk),
            Err(EngineError::UnknownCurrency("CZK".to_string()))
        );
        assert!(c.ensure_supported(Currency::Eur).is_ok());
        assert!(c.ensure_supported(Currency::Czk).is_err());
    }

    #[test]
    fn test_from_codes_filters_unsupported_and_unusable() {
        let table = ExchangeRateTable::from_codes(&HashMap::from([
            ("EUR".to_string(), 0.92),
            ("CZK".to_string(), f64::NAN),
            ("JPY".to_string(), 150.0),
            ("USD".to_string(), 1.0),
        ]));
        assert_eq!(table.rate(Currency::Eur), Ok(0.92));
        assert!(table.rate(Currency::Czk).is_err());
        assert_eq!(table.rate(Currency::Usd), Ok(1.0));
    }

    #[tokio::test]
    async fn test_load_uses_provider_rates() {
        let provider = MockRateProvider {
            rates: Some(HashMap::from([
                ("EUR".to_string(), 0.91),
                ("CZK".to_string(), 23.1),
            ])),
        };
        let table = ExchangeRateTable::load(Some(&provider)).await;
        assert_eq!(table.rate(Currency::Eur), Ok(0.91));
        assert_eq!(table.rate(Currency::Czk), Ok(23.1));
    }

    #[tokio::test]
    async fn test_load_fills_rates_missing_from_provider() {
        let provider = MockRateProvider {
            rates: Some(HashMap::from([("JPY".to_string(), 150.0)])),
        };
        let table = ExchangeRateTable::load(Some(&provider)).await;
        assert_eq!(table, ExchangeRateTable::fallback());

        let c = CurrencyConverter::new(Arc::new(table));
        assert!((c.to_usd(85.0, Currency::Eur).unwrap() - 100.0).abs() < 1e-9);

        let partial = MockRateProvider {
            rates: Some(HashMap::from([("EUR".to_string(), 0.9)])),
        };
        let table = ExchangeRateTable::load(Some(&partial)).await;
        assert_eq!(table.rate(Currency::Eur), Ok(0.9));
        assert_eq!(table.rate(Currency::Czk), Ok(21.5));
    }

    #[tokio::test]
    async fn test_load_falls_back_on_provider_failure() {
        let provider = MockRateProvider { rates: None };
        assert_eq!(
            ExchangeRateTable::fetch(&provider).await,
            Err(EngineError::ProviderUnavailable("mock".to_string()))
        );

        let table = ExchangeRateTable::load(Some(&provider)).await;
        assert_eq!(table, ExchangeRateTable::fallback());
        assert_eq!(ExchangeRateTable::load(None).await, ExchangeRateTable::fallback());
    }
}

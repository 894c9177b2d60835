pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{
    CollateralEngine, CurrencyConverter, ExchangeRateTable, LivePriceProvider, LoanForm,
    PriceResolver, PriceTable, RateProvider,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub enum AppCommand {
    /// Evaluate one loan and print the result.
    Calculate { form: LoanForm, json: bool },
    /// Read input events from stdin and recompute on change.
    Watch,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("loanworth starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let engine = build_engine(&config).await?;
    let default_form = LoanForm {
        currency: Some(config.currency.to_string()),
        ..LoanForm::default()
    };

    match command {
        AppCommand::Calculate { mut form, json } => {
            if form.currency.is_none() {
                form.currency = default_form.currency;
            }
            cli::calculate::run(&engine, form, json).await
        }
        AppCommand::Watch => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            cli::watch::run(
                Arc::new(engine),
                Duration::from_millis(config.debounce_ms),
                default_form,
                stdin,
            )
            .await
        }
    }
}

/// Loads the dataset and exchange rates and wires up the providers named in
/// `config`.
pub async fn build_engine(config: &AppConfig) -> Result<CollateralEngine> {
    let table = match &config.dataset_path {
        Some(path) => providers::dataset::load_price_table(path)?,
        None => {
            warn!("No dataset configured, every date needs the live price");
            PriceTable::new()
        }
    };

    let live = config.providers.coingecko.as_ref().map(|p| {
        Arc::new(providers::coingecko::CoinGeckoProvider::new(&p.base_url))
            as Arc<dyn LivePriceProvider>
    });

    let rate_provider = config
        .providers
        .exchange_rate
        .as_ref()
        .map(|p| providers::exchange_rate::ExchangeRateApiProvider::new(&p.base_url));
    let rates =
        ExchangeRateTable::load(rate_provider.as_ref().map(|p| p as &dyn RateProvider)).await;

    Ok(CollateralEngine::new(
        PriceResolver::new(Arc::new(table), live),
        CurrencyConverter::new(Arc::new(rates)),
    ))
}

//! Historical price table and the resolver that falls back to a live quote.

use super::error::EngineError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Immutable mapping from calendar date to the BTC/USD daily close.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: BTreeMap<NaiveDate, f64>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the close for `date` if one was loaded and it is a usable
    /// (finite, positive) price.
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.prices
            .get(&date)
            .copied()
            .filter(|price| price.is_finite() && *price > 0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.prices.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.prices.keys().next_back().copied()
    }
}

impl FromIterator<(NaiveDate, f64)> for PriceTable {
    /// Later entries for the same date replace earlier ones.
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

/// Supplies the current BTC/USD quote. Only "now" is available, there is no
/// historical backfill.
#[async_trait]
pub trait LivePriceProvider: Send + Sync {
    async fn fetch_current_price(&self) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    /// Settled daily close from the loaded dataset.
    Historical,
    /// Instantaneous quote from the live provider.
    Live,
}

impl Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PriceSource::Historical => "historical close",
                PriceSource::Live => "live quote",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPrice {
    pub price: f64,
    pub source: PriceSource,
}

pub struct PriceResolver {
    table: RwLock<Arc<PriceTable>>,
    live: Option<Arc<dyn LivePriceProvider>>,
}

impl PriceResolver {
    pub fn new(table: Arc<PriceTable>, live: Option<Arc<dyn LivePriceProvider>>) -> Self {
        Self {
            table: RwLock::new(table),
            live,
        }
    }

    /// Current table snapshot.
    pub fn table(&self) -> Arc<PriceTable> {
        Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swaps in a freshly loaded table. Lookups already in flight finish
    /// against the snapshot they started with.
    pub fn replace_table(&self, table: Arc<PriceTable>) {
        let mut current = self.table.write().unwrap_or_else(PoisonError::into_inner);
        debug!(entries = table.len(), "Replacing price table snapshot");
        *current = table;
    }

    pub async fn resolve(&self, date: NaiveDate) -> Result<ResolvedPrice, EngineError> {
        if let Some(price) = self.table().price_on(date) {
            debug!(%date, price, "Historical price hit");
            return Ok(ResolvedPrice {
                price,
                source: PriceSource::Historical,
            });
        }

        let Some(live) = &self.live else {
            debug!(%date, "Historical price miss, no live provider configured");
            return Err(EngineError::NoPriceData(date));
        };

        debug!(%date, "Historical price miss, querying live provider");
        match live.fetch_current_price().await {
            Ok(price) if price.is_finite() && price > 0.0 => Ok(ResolvedPrice {
                price,
                source: PriceSource::Live,
            }),
            Ok(price) => {
                warn!(%date, price, "Live provider returned an unusable price");
                Err(EngineError::NoPriceData(date))
            }
            Err(e) => {
                warn!(%date, error = %e, "Live price fetch failed");
                Err(EngineError::NoPriceData(date))
            }
        }
    }
}

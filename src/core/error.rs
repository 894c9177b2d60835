//! Failure taxonomy of the valuation engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors reported by price resolution, currency conversion and the
/// collateral calculation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Neither the historical table nor the live provider produced a usable
    /// price for the date.
    #[error("No price data available for {0}")]
    NoPriceData(NaiveDate),

    /// The currency code is not supported or has no loaded exchange rate.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// A loan input field is missing, unparsable or out of range.
    #[error("Invalid input for field: {0}")]
    InvalidInput(String),

    /// An external provider could not be reached or returned garbage.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
}

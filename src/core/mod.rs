//! Collateral valuation engine

pub mod calculator;
pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod loan;
pub mod log;
pub mod price;
pub mod reactive;

// Re-export main types for cleaner imports
pub use calculator::CollateralResult;
pub use currency::{Currency, CurrencyConverter, ExchangeRateTable, RateProvider};
pub use engine::{CollateralEngine, Valuation};
pub use error::EngineError;
pub use loan::{InputEvent, InputField, LoanForm, LoanRequest};
pub use price::{LivePriceProvider, PriceResolver, PriceSource, PriceTable};
pub use reactive::{ControllerState, ReactiveController, Recompute, Recomputation};

//! Resolve both prices for a request and run the calculator on them.

use super::calculator::{self, CollateralResult};
use super::currency::CurrencyConverter;
use super::error::EngineError;
use super::loan::{LoanForm, LoanRequest};
use super::price::{PriceResolver, PriceSource};
use super::reactive::Recompute;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// A computed result together with where each price came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub result: CollateralResult,
    pub start_source: PriceSource,
    pub end_source: PriceSource,
}

pub struct CollateralEngine {
    resolver: PriceResolver,
    converter: CurrencyConverter,
}

impl CollateralEngine {
    pub fn new(resolver: PriceResolver, converter: CurrencyConverter) -> Self {
        Self {
            resolver,
            converter,
        }
    }

    pub fn resolver(&self) -> &PriceResolver {
        &self.resolver
    }

    pub fn converter(&self) -> &CurrencyConverter {
        &self.converter
    }

    /// Input checks run before any lookup; when both lookups fail the start
    /// date is the one reported.
    #[instrument(name = "Evaluate", skip(self), fields(start = %request.start_date))]
    pub async fn evaluate(&self, request: &LoanRequest) -> Result<Valuation, EngineError> {
        request.validate()?;
        self.converter.ensure_supported(request.currency)?;
        let end_date = calculator::end_date(request)?;

        let (start, end) = futures::join!(
            self.resolver.resolve(request.start_date),
            self.resolver.resolve(end_date)
        );
        let start = start?;
        let end = end?;
        debug!(?start, ?end, "Resolved prices");

        let result = calculator::compute(request, start.price, end.price, &self.converter)?;
        Ok(Valuation {
            result,
            start_source: start.source,
            end_source: end.source,
        })
    }
}

#[async_trait]
impl Recompute for CollateralEngine {
    async fn recompute(&self, form: LoanForm) -> Result<Valuation, EngineError> {
        let request = form.to_request()?;
        self.evaluate(&request).await
    }
}

//! Compound interest versus collateral appreciation.
//!
//! Everything here is a pure function of already-resolved values: no I/O and
//! no validation of user input, which happens before a request gets here.

use super::currency::{Currency, CurrencyConverter};
use super::error::EngineError;
use super::loan::{InputField, LoanRequest};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Collateral posted as a multiple of the total amount due.
pub const COLLATERAL_RATIO: f64 = 2.0;

/// Interest compounds monthly.
pub const COMPOUNDING_PERIODS_PER_YEAR: f64 = 12.0;

/// Outcome of one loan evaluation. Money fields are in `currency`, the two
/// prices are BTC/USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub currency: Currency,
    pub loan_amount: f64,
    pub total_amount_due: f64,
    pub collateral_btc: f64,
    pub collateral_value_at_start: f64,
    pub collateral_value_at_end: f64,
    pub appreciation: f64,
    pub interest_paid: f64,
    pub net_result: f64,
    pub was_worth_it: bool,
    pub start_price_usd: f64,
    pub end_price_usd: f64,
    /// Annualized BTC price change over the loan, in percent.
    pub annualized_appreciation_percent: Option<f64>,
}

/// Adds calendar months by bumping the month field and keeping the day of
/// month. A day that does not exist in the target month rolls over into the
/// next one, so Jan 31 + 1 month is Mar 3 (Mar 2 in leap years).
pub fn add_months(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    let months = i32::try_from(months).ok()?;
    let index = (start.year() * 12 + start.month0() as i32).checked_add(months)?;
    let first_of_month =
        NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)?;
    first_of_month.checked_add_days(Days::new(u64::from(start.day() - 1)))
}

/// End date of the loan described by `request`.
pub fn end_date(request: &LoanRequest) -> Result<NaiveDate, EngineError> {
    add_months(request.start_date, request.duration_months)
        .ok_or_else(|| EngineError::InvalidInput(InputField::Duration.to_string()))
}

pub fn compute(
    request: &LoanRequest,
    start_price: f64,
    end_price: f64,
    rates: &CurrencyConverter,
) -> Result<CollateralResult, EngineError> {
    let end_date = end_date(request)?;
    if !start_price.is_finite() || start_price <= 0.0 {
        return Err(EngineError::NoPriceData(request.start_date));
    }
    if !end_price.is_finite() || end_price <= 0.0 {
        return Err(EngineError::NoPriceData(end_date));
    }

    let currency = request.currency;
    let loan_usd = rates.to_usd(request.loan_amount, currency)?;

    let r = request.annual_interest_rate_percent / 100.0;
    let n = COMPOUNDING_PERIODS_PER_YEAR;
    let t = f64::from(request.duration_months) / 12.0;
    let total_due_usd = loan_usd * (1.0 + r / n).powf(n * t);

    let collateral_usd = total_due_usd * COLLATERAL_RATIO;
    let collateral_btc = collateral_usd / start_price;

    let initial_value_usd = collateral_btc * start_price;
    let final_value_usd = collateral_btc * end_price;
    let appreciation_usd = final_value_usd - initial_value_usd;
    let interest_paid_usd = total_due_usd - loan_usd;
    let net_result_usd = appreciation_usd - interest_paid_usd;

    debug!(
        loan_usd,
        total_due_usd, collateral_btc, appreciation_usd, interest_paid_usd, "Computed collateral"
    );

    Ok(CollateralResult {
        start_date: request.start_date,
        end_date,
        currency,
        loan_amount: request.loan_amount,
        total_amount_due: rates.from_usd(total_due_usd, currency)?,
        collateral_btc,
        collateral_value_at_start: rates.from_usd(initial_value_usd, currency)?,
        collateral_value_at_end: rates.from_usd(final_value_usd, currency)?,
        appreciation: rates.from_usd(appreciation_usd, currency)?,
        interest_paid: rates.from_usd(interest_paid_usd, currency)?,
        net_result: rates.from_usd(net_result_usd, currency)?,
        was_worth_it: appreciation_usd > interest_paid_usd,
        start_price_usd: start_price,
        end_price_usd: end_price,
        annualized_appreciation_percent: annualized_change(start_price, end_price, t),
    })
}

/// Compound annual growth rate of the BTC price, in percent. `None` when the
/// result does not fit a `Decimal`, which short loans with large moves hit.
fn annualized_change(start_price: f64, end_price: f64, years: f64) -> Option<f64> {
    let begin_bal = Decimal::from_f64(start_price)?;
    let end_bal = Decimal::from_f64(end_price)?;
    let n_years = Decimal::from_f64(years)?;
    if n_years.is_zero() || begin_bal.is_zero() {
        return None;
    }

    let growth = end_bal
        .checked_div(begin_bal)?
        .checked_powd(Decimal::ONE.checked_div(n_years)?)?;
    let rate = growth - Decimal::ONE;
    rate.checked_mul(Decimal::ONE_HUNDRED)?.to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::ExchangeRateTable;
    use std::sync::Arc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rates() -> CurrencyConverter {
        CurrencyConverter::new(Arc::new(ExchangeRateTable::fallback()))
    }

    fn request(months: u32, rate: f64) -> LoanRequest {
        LoanRequest {
            start_date: date("2021-01-01"),
            duration_months: months,
            currency: Currency::Eur,
            loan_amount: 5000.0,
            annual_interest_rate_percent: rate,
        }
    }

    #[test]
    fn test_scenario_price_doubles_is_worth_it() {
        let result = compute(&request(12, 7.0), 30000.0, 60000.0, &rates()).unwrap();

        let loan_usd = 5000.0 / 0.85;
        let due_usd = loan_usd * (1.0 + 0.07 / 12.0_f64).powi(12);
        assert!((result.total_amount_due - due_usd * 0.85).abs() < 1e-6);
        assert!((result.collateral_btc - due_usd * 2.0 / 30000.0).abs() < 1e-12);
        assert!(result.appreciation > 0.0);
        assert!(result.was_worth_it);
        assert_eq!(result.end_date, date("2022-01-01"));
        assert!((result.net_result - (result.appreciation - result.interest_paid)).abs() < 1e-6);
        let doubled = 2.0 * result.collateral_value_at_start;
        assert!((result.collateral_value_at_end - doubled).abs() < 1e-6);
        assert!((result.annualized_appreciation_percent.unwrap() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_scenario_flat_price_is_not_worth_it() {
        let result = compute(&request(12, 7.0), 30000.0, 30000.0, &rates()).unwrap();
        assert_eq!(result.appreciation, 0.0);
        assert!(result.interest_paid > 0.0);
        assert!(!result.was_worth_it);
        assert!(result.net_result < 0.0);
    }

    #[test]
    fn test_zero_duration_accrues_nothing() {
        let result = compute(&request(0, 7.0), 30000.0, 45000.0, &rates()).unwrap();
        assert!((result.total_amount_due - 5000.0).abs() < 1e-9);
        assert!(result.interest_paid.abs() < 1e-9);
        assert_eq!(result.end_date, date("2021-01-01"));
        assert_eq!(result.annualized_appreciation_percent, None);
    }

    #[test]
    fn test_short_loan_with_large_move_has_no_annualized_change() {
        let request = LoanRequest {
            duration_months: 1,
            currency: Currency::Usd,
            loan_amount: 1000.0,
            annual_interest_rate_percent: 5.0,
            ..request(1, 5.0)
        };
        let result = compute(&request, 100.0, 65000.0, &rates()).unwrap();
        assert_eq!(result.annualized_appreciation_percent, None);
        assert!(result.was_worth_it);
        assert_eq!(result.end_date, date("2021-02-01"));
    }

    #[test]
    fn test_zero_rate_accrues_nothing() {
        for months in [1, 6, 12, 60] {
            let result = compute(&request(months, 0.0), 30000.0, 30000.0, &rates()).unwrap();
            assert!((result.total_amount_due - 5000.0).abs() < 1e-9);
            assert!(result.interest_paid.abs() < 1e-9);
        }
    }

    #[test]
    fn test_interest_increases_with_rate() {
        let mut previous = -1.0;
        for rate in [0.0, 0.5, 3.0, 7.0, 12.5, 40.0] {
            let result = compute(&request(18, rate), 30000.0, 30000.0, &rates()).unwrap();
            assert!(result.interest_paid > previous, "rate {rate}");
            previous = result.interest_paid;
        }
    }

    #[test]
    fn test_usd_request_has_no_conversion() {
        let mut req = request(12, 12.0);
        req.currency = Currency::Usd;
        let result = compute(&req, 10000.0, 10000.0, &rates()).unwrap();
        let expected_due = 5000.0 * (1.01_f64).powi(12);
        assert!((result.total_amount_due - expected_due).abs() < 1e-9);
        assert!((result.collateral_value_at_start - expected_due * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_unusable_prices_are_no_price_data() {
        let req = request(12, 7.0);
        assert_eq!(
            compute(&req, 0.0, 30000.0, &rates()),
            Err(EngineError::NoPriceData(date("2021-01-01")))
        );
        assert_eq!(
            compute(&req, 30000.0, f64::NAN, &rates()),
            Err(EngineError::NoPriceData(date("2022-01-01")))
        );
    }

    #[test]
    fn test_currency_without_rate_fails() {
        let table = ExchangeRateTable::from_codes(&Default::default());
        let converter = CurrencyConverter::new(Arc::new(table));
        assert_eq!(
            compute(&request(12, 7.0), 30000.0, 30000.0, &converter),
            Err(EngineError::UnknownCurrency("EUR".to_string()))
        );
    }

    #[test]
    fn test_add_months() {
        assert_eq!(add_months(date("2021-01-15"), 1), Some(date("2021-02-15")));
        assert_eq!(add_months(date("2021-11-30"), 2), Some(date("2022-01-30")));
        assert_eq!(add_months(date("2021-03-10"), 36), Some(date("2024-03-10")));
        assert_eq!(add_months(date("2021-03-10"), 0), Some(date("2021-03-10")));
    }

    #[test]
    fn test_add_months_rolls_over_short_months() {
        assert_eq!(add_months(date("2021-01-31"), 1), Some(date("2021-03-03")));
        assert_eq!(add_months(date("2024-01-31"), 1), Some(date("2024-03-02")));
        assert_eq!(add_months(date("2020-02-29"), 12), Some(date("2021-03-01")));
        assert_eq!(add_months(date("2021-08-31"), 1), Some(date("2021-10-01")));
    }

    #[test]
    fn test_add_months_out_of_range() {
        assert_eq!(add_months(date("2021-01-01"), u32::MAX), None);
    }
}

//! Loan inputs, from raw form fields to a validated request.

use super::currency::Currency;
use super::error::EngineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The inputs that fully determine one collateral computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub start_date: NaiveDate,
    pub duration_months: u32,
    pub currency: Currency,
    pub loan_amount: f64,
    pub annual_interest_rate_percent: f64,
}

impl LoanRequest {
    /// Rejects values the calculator is not defined for.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.loan_amount.is_finite() || self.loan_amount <= 0.0 {
            return Err(EngineError::InvalidInput(InputField::Amount.to_string()));
        }
        let rate = self.annual_interest_rate_percent;
        if !rate.is_finite() || rate < 0.0 {
            return Err(EngineError::InvalidInput(InputField::Rate.to_string()));
        }
        if self.duration_months == 0 {
            return Err(EngineError::InvalidInput(InputField::Duration.to_string()));
        }
        Ok(())
    }
}

/// User-editable inputs that trigger a recomputation when changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputField {
    StartDate,
    Currency,
    Amount,
    Rate,
    Duration,
}

impl Display for InputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                InputField::StartDate => "start_date",
                InputField::Currency => "currency",
                InputField::Amount => "loan_amount",
                InputField::Rate => "interest_rate",
                InputField::Duration => "duration_months",
            }
        )
    }
}

impl FromStr for InputField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" | "start-date" | "start_date" => Ok(InputField::StartDate),
            "currency" => Ok(InputField::Currency),
            "amount" | "loan-amount" | "loan_amount" => Ok(InputField::Amount),
            "rate" | "interest-rate" | "interest_rate" => Ok(InputField::Rate),
            "months" | "duration" | "duration_months" => Ok(InputField::Duration),
            _ => Err(anyhow::anyhow!("Unknown input field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub field: InputField,
    pub value: String,
}

impl InputEvent {
    pub fn new(field: InputField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

impl FromStr for InputEvent {
    type Err = anyhow::Error;

    /// Parses `field=value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected field=value, got: {}", s))?;
        Ok(InputEvent::new(field.parse()?, value.trim()))
    }
}

/// Raw field values as last entered. Nothing is parsed until
/// [`LoanForm::to_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanForm {
    pub start_date: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<String>,
    pub rate: Option<String>,
    pub duration: Option<String>,
}

impl LoanForm {
    pub fn apply(&mut self, event: InputEvent) {
        let slot = match event.field {
            InputField::StartDate => &mut self.start_date,
            InputField::Currency => &mut self.currency,
            InputField::Amount => &mut self.amount,
            InputField::Rate => &mut self.rate,
            InputField::Duration => &mut self.duration,
        };
        *slot = Some(event.value);
    }

    /// Parses and validates every field. A missing currency means USD.
    pub fn to_request(&self) -> Result<LoanRequest, EngineError> {
        let start_date = required(&self.start_date, InputField::StartDate)
            .and_then(|s| parse_field(s, InputField::StartDate))?;
        let currency = match self.currency.as_deref().map(str::trim) {
            None | Some("") => Currency::Usd,
            Some(code) => code.parse()?,
        };
        let loan_amount = required(&self.amount, InputField::Amount)
            .and_then(|s| parse_field(s, InputField::Amount))?;
        let annual_interest_rate_percent = required(&self.rate, InputField::Rate)
            .and_then(|s| parse_field(s, InputField::Rate))?;
        let duration_months = required(&self.duration, InputField::Duration)
            .and_then(|s| parse_field(s, InputField::Duration))?;

        let request = LoanRequest {
            start_date,
            duration_months,
            currency,
            loan_amount,
            annual_interest_rate_percent,
        };
        request.validate()?;
        Ok(request)
    }
}

fn required(value: &Option<String>, field: InputField) -> Result<&str, EngineError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::InvalidInput(field.to_string()))
}

fn parse_field<T: FromStr>(value: &str, field: InputField) -> Result<T, EngineError> {
    value
        .parse()
        .map_err(|_| EngineError::InvalidInput(field.to_string()))
}

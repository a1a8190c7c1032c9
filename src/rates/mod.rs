//! Exchange Rate Provider
//!
//! Supplies the conversion and commission rate for a currency pair at the
//! moment an exchange is processed.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::{Currency, DomainError, MAX_SCALE};

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Unsupported currency pair: {from} -> {to}")]
    UnsupportedPair { from: Currency, to: Currency },

    #[error("Rate source unavailable: {0}")]
    Unavailable(String),
}

impl From<RateError> for DomainError {
    fn from(e: RateError) -> Self {
        match e {
            RateError::UnsupportedPair { from, to } => DomainError::InvalidCurrencyPair {
                from: from.to_string(),
                to: to.to_string(),
            },
            RateError::Unavailable(message) => DomainError::Internal(message),
        }
    }
}

/// Rates quoted for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExchangeQuote {
    pub conversion_rate: Decimal,
    /// Fraction in [0, 1) withheld from the converted amount
    pub commission_rate: Decimal,
}

impl ExchangeQuote {
    /// `amount × conversion_rate × (1 − commission_rate)`, rounded to the
    /// balance scale with banker's rounding
    pub fn destination_amount(&self, amount: Decimal) -> Option<Decimal> {
        amount
            .checked_mul(self.conversion_rate)?
            .checked_mul(Decimal::ONE - self.commission_rate)
            .map(|value| {
                value
                    .round_dp_with_strategy(MAX_SCALE, RoundingStrategy::MidpointNearestEven)
                    .normalize()
            })
    }
}

#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    async fn rate(&self, from: Currency, to: Currency) -> Result<ExchangeQuote, RateError>;
}

/// Fixed table of units per US dollar
#[derive(Debug, Clone)]
pub struct StaticRateProvider {
    per_usd: HashMap<Currency, Decimal>,
    commission_rate: Decimal,
}

impl Default for StaticRateProvider {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}

impl StaticRateProvider {
    pub fn new(commission_rate: Decimal) -> Self {
        let per_usd = HashMap::from([
            (Currency::USDollar, Decimal::ONE),
            (Currency::ZambianKwacha, Decimal::from(26)),
            (Currency::MalawianKwacha, Decimal::from(1730)),
            (Currency::ZimbabweanDollar, Decimal::from(322)),
        ]);
        Self {
            per_usd,
            commission_rate,
        }
    }
}

#[async_trait]
impl ExchangeRateProvider for StaticRateProvider {
    async fn rate(&self, from: Currency, to: Currency) -> Result<ExchangeQuote, RateError> {
        let unsupported = || RateError::UnsupportedPair { from, to };

        if from == to {
            return Err(unsupported());
        }
        let from_units = self.per_usd.get(&from).ok_or_else(unsupported)?;
        let to_units = self.per_usd.get(&to).ok_or_else(unsupported)?;
        let conversion_rate = to_units.checked_div(*from_units).ok_or_else(unsupported)?;

        Ok(ExchangeQuote {
            conversion_rate,
            commission_rate: self.commission_rate,
        })
    }
}

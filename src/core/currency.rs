//! Conversion of holding values into the base currency.

use crate::core::error::{AllocationError, AllocationResult};
use crate::core::sources::PriceFeed;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// Resolves exchange rates into the base currency for one aggregation run.
///
/// Rates are cached for the lifetime of the normalizer only. Create a new one per run so a rate
/// is never carried over from an earlier snapshot.
pub struct CurrencyNormalizer<'a> {
    feed: &'a dyn PriceFeed,
    base_currency: String,
    rates: HashMap<String, Decimal>,
}

impl<'a> CurrencyNormalizer<'a> {
    pub fn new(feed: &'a dyn PriceFeed, base_currency: &str) -> Self {
        Self {
            feed,
            base_currency: base_currency.to_string(),
            rates: HashMap::new(),
        }
    }

    pub fn is_base(&self, currency: &str) -> bool {
        currency.eq_ignore_ascii_case(&self.base_currency)
    }

    /// Value of one unit of `currency` in the base currency.
    pub async fn rate_for(&mut self, currency: &str) -> AllocationResult<Decimal> {
        if self.is_base(currency) {
            return Ok(Decimal::ONE);
        }
        if let Some(rate) = self.rates.get(currency) {
            debug!(currency, %rate, "Rate cache hit");
            return Ok(*rate);
        }

        let rate = self
            .feed
            .latest_rate(currency)
            .await?
            .ok_or_else(|| AllocationError::RateUnavailable {
                currency: currency.to_string(),
            })?;
        debug!(currency, %rate, base = %self.base_currency, "Resolved exchange rate");
        self.rates.insert(currency.to_string(), rate);
        Ok(rate)
    }

    /// Converts `value` into the base currency. Base-currency values are returned untouched
    /// without consulting the feed.
    pub async fn to_base(&mut self, value: Decimal, currency: &str) -> AllocationResult<Decimal> {
        if self.is_base(currency) {
            return Ok(value);
        }
        let rate = self.rate_for(currency).await?;
        Ok(value * rate)
    }
}

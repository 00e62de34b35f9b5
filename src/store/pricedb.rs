use crate::core::sources::{CURRENCY_NAMESPACE, NAMESPACE_SEPARATOR, Price, PriceFeed};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

const KEY_SEPARATOR: char = '|';

/// A stored price with its symbol and date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceEntry {
    pub symbol: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub price: Price,
}

/// Local price history on a fjall keyspace.
///
/// Entries are keyed `SYMBOL|YYYY-MM-DD`, so the last key under a symbol's prefix is its latest
/// price. Exchange rates live under the `CURRENCY` namespace, `CURRENCY:EUR` being the value of
/// one euro in the base currency.
pub struct PriceDb {
    keyspace: Keyspace,
    prices: PartitionHandle,
}

impl PriceDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let keyspace = Config::new(path)
            .open()
            .with_context(|| format!("Failed to open price database: {}", path.display()))?;
        let prices = keyspace.open_partition("prices", PartitionCreateOptions::default())?;
        debug!(path = %path.display(), "Opened price database");
        Ok(Self { keyspace, prices })
    }

    pub fn rate_symbol(currency: &str) -> String {
        format!("{CURRENCY_NAMESPACE}{NAMESPACE_SEPARATOR}{}", currency.to_uppercase())
    }

    /// Stores `price` for `symbol` on `date`, replacing an entry for the same day.
    pub fn add_price(&self, symbol: &str, date: NaiveDate, price: &Price) -> Result<()> {
        let key = format!("{symbol}{KEY_SEPARATOR}{}", date.format("%Y-%m-%d"));
        self.prices.insert(key, serde_json::to_vec(price)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(symbol, %date, value = %price.value, "Stored price");
        Ok(())
    }

    /// Most recent entry for `symbol`.
    pub fn latest(&self, symbol: &str) -> Result<Option<PriceEntry>> {
        let prefix = format!("{symbol}{KEY_SEPARATOR}");
        match self.prices.prefix(prefix).next_back() {
            Some(item) => {
                let (key, value) = item?;
                Ok(Some(decode_entry(&key, &value)?))
            }
            None => Ok(None),
        }
    }

    /// All entries, ordered by symbol and date. `symbol` narrows the listing to one symbol.
    pub fn list(&self, symbol: Option<&str>) -> Result<Vec<PriceEntry>> {
        let prefix = symbol
            .map(|s| format!("{s}{KEY_SEPARATOR}"))
            .unwrap_or_default();
        self.prices
            .prefix(prefix)
            .map(|item| {
                let (key, value) = item?;
                decode_entry(&key, &value)
            })
            .collect()
    }
}

fn decode_entry(key: &[u8], value: &[u8]) -> Result<PriceEntry> {
    let key = std::str::from_utf8(key)?;
    let (symbol, date) = key
        .rsplit_once(KEY_SEPARATOR)
        .ok_or_else(|| anyhow!("Malformed price key: {key}"))?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Malformed date in price key: {key}"))?;
    let price: Price = serde_json::from_slice(value)
        .with_context(|| format!("Malformed price entry for {key}"))?;
    Ok(PriceEntry {
        symbol: symbol.to_string(),
        date,
        price,
    })
}

#[async_trait]
impl PriceFeed for PriceDb {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Price>> {
        Ok(self.latest(symbol)?.map(|entry| entry.price))
    }

    async fn latest_rate(&self, currency: &str) -> Result<Option<Decimal>> {
        Ok(self
            .latest(&Self::rate_symbol(currency))?
            .map(|entry| entry.price.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn aud(value: Decimal) -> Price {
        Price {
            value,
            currency: "AUD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_latest_price_wins() {
        let dir = tempdir().unwrap();
        let db = PriceDb::open(dir.path()).unwrap();

        db.add_price("ASX:VHY", date("2024-03-01"), &aud(dec!(60.10))).unwrap();
        db.add_price("ASX:VHY", date("2024-05-01"), &aud(dec!(62.45))).unwrap();
        db.add_price("ASX:VHY", date("2024-04-01"), &aud(dec!(61.00))).unwrap();
        db.add_price("ASX:VHYX", date("2025-01-01"), &aud(dec!(1))).unwrap();

        let latest = db.latest("ASX:VHY").unwrap().unwrap();
        assert_eq!(latest.date, date("2024-05-01"));
        assert_eq!(
            db.latest_price("ASX:VHY").await.unwrap(),
            Some(aud(dec!(62.45)))
        );
        assert_eq!(db.latest_price("ASX:NONE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rates_live_under_currency_namespace() {
        let dir = tempdir().unwrap();
        let db = PriceDb::open(dir.path()).unwrap();

        db.add_price(&PriceDb::rate_symbol("usd"), date("2024-05-01"), &aud(dec!(1.52)))
            .unwrap();

        assert_eq!(db.latest_rate("USD").await.unwrap(), Some(dec!(1.52)));
        assert_eq!(db.latest_rate("EUR").await.unwrap(), None);
    }

    #[test]
    fn test_list_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = PriceDb::open(dir.path()).unwrap();
            db.add_price("NYSEARCA:VEU", date("2024-05-01"), &aud(dec!(90))).unwrap();
            db.add_price("ASX:VHY", date("2024-05-01"), &aud(dec!(62))).unwrap();
            db.add_price("ASX:VHY", date("2024-05-02"), &aud(dec!(63))).unwrap();
        }

        let db = PriceDb::open(dir.path()).unwrap();
        let all = db.list(None).unwrap();
        let keys: Vec<_> = all.iter().map(|e| (e.symbol.as_str(), e.date)).collect();
        assert_eq!(
            keys,
            vec![
                ("ASX:VHY", date("2024-05-01")),
                ("ASX:VHY", date("2024-05-02")),
                ("NYSEARCA:VEU", date("2024-05-01")),
            ]
        );
        assert_eq!(db.list(Some("NYSEARCA:VEU")).unwrap().len(), 1);
    }
}

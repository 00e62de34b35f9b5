use crate::core::sources::Ledger;
use crate::store::memory::is_under;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityLot {
    pub symbol: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountBalance {
    pub name: String,
    pub currency: String,
    pub balance: Decimal,
}

/// Book-keeping export in YAML: security lots and account balances.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub securities: Vec<SecurityLot>,
    #[serde(default)]
    pub accounts: Vec<AccountBalance>,
}

impl LedgerFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger file: {}", path.display()))?;
        let ledger: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse ledger file: {}", path.display()))?;
        debug!(
            securities = ledger.securities.len(),
            accounts = ledger.accounts.len(),
            "Loaded ledger file"
        );
        Ok(ledger)
    }

    /// Currencies of all account balances, sorted and deduplicated.
    pub fn currencies(&self) -> Vec<String> {
        let mut currencies: Vec<_> = self.accounts.iter().map(|a| a.currency.clone()).collect();
        currencies.sort();
        currencies.dedup();
        currencies
    }
}

#[async_trait]
impl Ledger for LedgerFile {
    async fn quantity_of(&self, symbol: &str) -> Result<Option<Decimal>> {
        let quantity = self
            .securities
            .iter()
            .filter(|lot| lot.symbol == symbol)
            .map(|lot| lot.quantity)
            .reduce(|acc, q| acc + q);
        Ok(quantity)
    }

    async fn cash_balances_under(&self, root_account: &str) -> Result<BTreeMap<String, Decimal>> {
        let mut balances = BTreeMap::new();
        for account in self.accounts.iter().filter(|a| is_under(&a.name, root_account)) {
            *balances
                .entry(account.currency.clone())
                .or_insert(Decimal::ZERO) += account.balance;
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LEDGER: &str = r#"
securities:
  - { symbol: "ASX:VHY", quantity: 10 }
  - { symbol: "ASX:VHY", quantity: 5.5 }
  - { symbol: "NYSEARCA:VEU", quantity: 3 }
accounts:
  - { name: "Assets:Investments:Cash", currency: AUD, balance: 100 }
  - { name: "Assets:Investments:Cash:Broker", currency: AUD, balance: 50 }
  - { name: "Assets:Investments:Cash:Broker", currency: USD, balance: 20 }
  - { name: "Assets:Investments:CashBox", currency: AUD, balance: 999 }
  - { name: "Assets:Bank", currency: AUD, balance: 1000 }
"#;

    fn ledger() -> LedgerFile {
        serde_yaml::from_str(LEDGER).unwrap()
    }

    #[tokio::test]
    async fn test_lots_are_summed() {
        let ledger = ledger();
        assert_eq!(ledger.quantity_of("ASX:VHY").await.unwrap(), Some(dec!(15.5)));
        assert_eq!(ledger.quantity_of("NYSEARCA:VEU").await.unwrap(), Some(dec!(3)));
        assert_eq!(ledger.quantity_of("ASX:NONE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cash_under_root_per_currency() {
        let balances = ledger()
            .cash_balances_under("Assets:Investments:Cash")
            .await
            .unwrap();

        assert_eq!(balances.len(), 2);
        assert_eq!(balances["AUD"], dec!(150));
        assert_eq!(balances["USD"], dec!(20));
    }

    #[test]
    fn test_currencies() {
        assert_eq!(ledger().currencies(), vec!["AUD", "USD"]);
    }
}

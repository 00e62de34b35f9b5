//! In-memory data sources, handy for embedding and for tests.

use crate::core::model::ClassId;
use crate::core::sources::{
    AllocationStore, ClassRecord, Ledger, Price, PriceFeed, StockLink, sort_class_records,
};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct CashAccount {
    name: String,
    currency: String,
    balance: Decimal,
}

/// Allocation targets, ledger and prices held in memory.
///
/// Implements all three source traits so a whole run can be driven from one value.
#[derive(Debug, Default)]
pub struct MemoryBook {
    classes: Vec<ClassRecord>,
    links: Vec<StockLink>,
    quantities: HashMap<String, Decimal>,
    accounts: Vec<CashAccount>,
    prices: HashMap<String, Price>,
    rates: HashMap<String, Decimal>,
    rate_lookups: AtomicUsize,
}

impl MemoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(
        mut self,
        id: ClassId,
        parent_id: Option<ClassId>,
        name: &str,
        target_allocation: Decimal,
    ) -> Self {
        let sort_order = self.classes.len() as i64;
        self.classes.push(ClassRecord {
            id,
            parent_id,
            name: name.to_string(),
            target_allocation,
            sort_order,
        });
        self
    }

    pub fn with_link(mut self, class_id: ClassId, symbol: &str) -> Self {
        self.links.push(StockLink {
            class_id,
            symbol: symbol.to_string(),
        });
        self
    }

    pub fn with_quantity(mut self, symbol: &str, quantity: Decimal) -> Self {
        self.quantities.insert(symbol.to_string(), quantity);
        self
    }

    pub fn with_price(mut self, symbol: &str, value: Decimal, currency: &str) -> Self {
        self.prices.insert(
            symbol.to_string(),
            Price {
                value,
                currency: currency.to_string(),
            },
        );
        self
    }

    pub fn with_rate(mut self, currency: &str, rate: Decimal) -> Self {
        self.rates.insert(currency.to_string(), rate);
        self
    }

    pub fn with_cash(mut self, account: &str, currency: &str, balance: Decimal) -> Self {
        self.accounts.push(CashAccount {
            name: account.to_string(),
            currency: currency.to_string(),
            balance,
        });
        self
    }

    /// Number of exchange-rate requests served so far.
    pub fn rate_lookups(&self) -> usize {
        self.rate_lookups.load(Ordering::SeqCst)
    }
}

/// True when `account` is `root` itself or sits below it in the account hierarchy.
pub(crate) fn is_under(account: &str, root: &str) -> bool {
    account == root
        || account
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with(':'))
}

#[async_trait]
impl AllocationStore for MemoryBook {
    async fn list_classes(&self) -> Result<Vec<ClassRecord>> {
        let mut records = self.classes.clone();
        sort_class_records(&mut records);
        Ok(records)
    }

    async fn list_stock_links(&self) -> Result<Vec<StockLink>> {
        Ok(self.links.clone())
    }
}

#[async_trait]
impl Ledger for MemoryBook {
    async fn quantity_of(&self, symbol: &str) -> Result<Option<Decimal>> {
        Ok(self.quantities.get(symbol).copied())
    }

    async fn cash_balances_under(&self, root_account: &str) -> Result<BTreeMap<String, Decimal>> {
        let mut balances = BTreeMap::new();
        for account in self
            .accounts
            .iter()
            .filter(|a| is_under(&a.name, root_account))
        {
            *balances
                .entry(account.currency.clone())
                .or_insert(Decimal::ZERO) += account.balance;
        }
        Ok(balances)
    }
}

#[async_trait]
impl PriceFeed for MemoryBook {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Price>> {
        Ok(self.prices.get(symbol).cloned())
    }

    async fn latest_rate(&self, currency: &str) -> Result<Option<Decimal>> {
        self.rate_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.rates.get(currency).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_is_under() {
        assert!(is_under("Assets:Cash", "Assets:Cash"));
        assert!(is_under("Assets:Cash:Bank", "Assets:Cash"));
        assert!(!is_under("Assets:CashBack", "Assets:Cash"));
        assert!(!is_under("Assets", "Assets:Cash"));
    }

    #[tokio::test]
    async fn test_cash_balances_grouped_by_currency() {
        let book = MemoryBook::new()
            .with_cash("Assets:Cash:Bank", "AUD", dec!(100))
            .with_cash("Assets:Cash:Broker", "AUD", dec!(50))
            .with_cash("Assets:Cash:Wise", "EUR", dec!(20))
            .with_cash("Assets:Savings", "AUD", dec!(999));

        let balances = book.cash_balances_under("Assets:Cash").await.unwrap();

        assert_eq!(balances.len(), 2);
        assert_eq!(balances["AUD"], dec!(150));
        assert_eq!(balances["EUR"], dec!(20));
    }
}

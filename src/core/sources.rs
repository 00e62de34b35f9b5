//! Read-only data sources the loader merges into an allocation tree.

use crate::core::model::ClassId;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace separator in security symbols, as in `ASX:VHY`.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Namespace under which exchange rates are kept in a price database.
pub const CURRENCY_NAMESPACE: &str = "CURRENCY";

/// Splits `ASX:VHY` into `(Some("ASX"), "VHY")`.
pub fn split_symbol(symbol: &str) -> (Option<&str>, &str) {
    match symbol.split_once(NAMESPACE_SEPARATOR) {
        Some((namespace, mnemonic)) => (Some(namespace), mnemonic),
        None => (None, symbol),
    }
}

/// An asset class row in the allocation-target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: ClassId,
    #[serde(default)]
    pub parent_id: Option<ClassId>,
    pub name: String,
    #[serde(alias = "allocation")]
    pub target_allocation: Decimal,
    #[serde(default)]
    pub sort_order: i64,
}

/// Links a security to the asset class it counts towards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLink {
    pub class_id: ClassId,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
    pub currency: String,
}

#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// All classes, ordered by parent id (top level first) and then sort order.
    async fn list_classes(&self) -> Result<Vec<ClassRecord>>;
    async fn list_stock_links(&self) -> Result<Vec<StockLink>>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Number of shares held, `None` when the ledger does not know the symbol.
    async fn quantity_of(&self, symbol: &str) -> Result<Option<Decimal>>;
    /// Balances of the cash accounts under `root_account`, per currency.
    async fn cash_balances_under(&self, root_account: &str) -> Result<BTreeMap<String, Decimal>>;
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Price>>;
    /// Value of one unit of `currency` in the base currency.
    async fn latest_rate(&self, currency: &str) -> Result<Option<Decimal>>;
}

/// Orders class records the way the store contract promises: top level first, then by parent,
/// then by sort order.
pub fn sort_class_records(records: &mut [ClassRecord]) {
    records.sort_by_key(|r| (r.parent_id.is_some(), r.parent_id, r.sort_order, r.id));
}

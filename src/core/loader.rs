//! Builds an allocation tree by merging the target store, the ledger and the price feed.

use crate::core::currency::CurrencyNormalizer;
use crate::core::error::{AllocationError, AllocationResult};
use crate::core::model::{AssetAllocationModel, AssetClass, Holding, HoldingIndex, HoldingKind};
use crate::core::sources::{AllocationStore, Ledger, PriceFeed, sort_class_records};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// What to do with a foreign holding when no exchange rate can be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatePolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Value the holding at zero and flag it.
    Zero,
}

pub struct AssetAllocationLoader<'a> {
    store: &'a dyn AllocationStore,
    ledger: &'a dyn Ledger,
    prices: &'a dyn PriceFeed,
    cash_root: Option<String>,
    rate_policy: RatePolicy,
}

impl<'a> AssetAllocationLoader<'a> {
    pub fn new(
        store: &'a dyn AllocationStore,
        ledger: &'a dyn Ledger,
        prices: &'a dyn PriceFeed,
    ) -> Self {
        Self {
            store,
            ledger,
            prices,
            cash_root: None,
            rate_policy: RatePolicy::default(),
        }
    }

    /// Ledger account whose descendants hold the cash balances.
    pub fn with_cash_root(mut self, cash_root: Option<&str>) -> Self {
        self.cash_root = cash_root.map(str::to_string);
        self
    }

    pub fn with_rate_policy(mut self, rate_policy: RatePolicy) -> Self {
        self.rate_policy = rate_policy;
        self
    }

    /// Runs every loading pass in order and returns a tree ready for the engine.
    #[instrument(name = "BuildAllocation", skip(self))]
    pub async fn build(&self, base_currency: &str) -> AllocationResult<AssetAllocationModel> {
        let mut model = self.load_skeleton(base_currency).await?;
        self.load_stock_links(&mut model).await?;
        self.load_quantities(&mut model).await?;
        self.load_prices(&mut model).await?;
        self.load_cash_balances(&mut model).await?;
        self.normalize_currencies(&mut model).await?;
        info!(
            classes = model.class_count(),
            holdings = model.holdings().count(),
            "Allocation tree loaded"
        );
        Ok(model)
    }

    /// Creates the class tree from the target store. Holdings are not touched.
    pub async fn load_skeleton(
        &self,
        base_currency: &str,
    ) -> AllocationResult<AssetAllocationModel> {
        load_targets(self.store, base_currency).await
    }

    /// Attaches an empty stock holding for every symbol linked to a class.
    pub async fn load_stock_links(&self, model: &mut AssetAllocationModel) -> AllocationResult<()> {
        let links = self.store.list_stock_links().await?;
        let base_currency = model.base_currency.clone();
        for link in links {
            match model.class_by_id(link.class_id) {
                Some(owner) => {
                    model.attach_holding(Holding::stock(&link.symbol, &base_currency, owner));
                }
                None => warn!(
                    symbol = %link.symbol,
                    class_id = link.class_id,
                    "Stock link refers to a missing asset class, skipping"
                ),
            }
        }
        Ok(())
    }

    pub async fn load_quantities(&self, model: &mut AssetAllocationModel) -> AllocationResult<()> {
        for (idx, symbol) in stock_symbols(model) {
            let quantity = match self.ledger.quantity_of(&symbol).await? {
                Some(quantity) => quantity,
                None => {
                    debug!(%symbol, "Symbol not found in ledger, quantity is zero");
                    Decimal::ZERO
                }
            };
            if let HoldingKind::Stock { quantity: q, .. } = &mut model.holding_mut(idx).kind {
                *q = quantity;
            }
        }
        Ok(())
    }

    /// Sets the last known price of every stock. Stocks without a price are valued at one unit
    /// of the base currency per share so the run can continue.
    pub async fn load_prices(&self, model: &mut AssetAllocationModel) -> AllocationResult<()> {
        let base_currency = model.base_currency.clone();
        for (idx, symbol) in stock_symbols(model) {
            let (price, currency, missing) = match self.prices.latest_price(&symbol).await? {
                Some(price) => (price.value, price.currency, false),
                None => {
                    warn!(%symbol, "No price found, using a unit price in the base currency");
                    (Decimal::ONE, base_currency.clone(), true)
                }
            };
            let holding = model.holding_mut(idx);
            holding.native_currency = currency;
            if let HoldingKind::Stock {
                last_price,
                price_missing,
                ..
            } = &mut holding.kind
            {
                *last_price = price;
                *price_missing = missing;
            }
        }
        Ok(())
    }

    /// Adds one cash holding per currency to the `Cash` class.
    pub async fn load_cash_balances(
        &self,
        model: &mut AssetAllocationModel,
    ) -> AllocationResult<()> {
        let Some(cash_root) = self.cash_root.as_deref() else {
            debug!("No cash root configured, skipping cash balances");
            return Ok(());
        };

        let balances = self.ledger.cash_balances_under(cash_root).await?;
        if balances.is_empty() {
            debug!(%cash_root, "No cash balances found");
            return Ok(());
        }

        let Some(cash_class) = model.cash_class() else {
            warn!(
                %cash_root,
                currencies = balances.len(),
                "No Cash asset class defined, dropping cash balances"
            );
            return Ok(());
        };

        for (currency, balance) in balances {
            debug!(%currency, %balance, "Adding cash balance");
            model.attach_holding(Holding::cash(&currency, balance, cash_class));
        }
        Ok(())
    }

    /// Fills `value_in_base_currency` for every holding.
    pub async fn normalize_currencies(
        &self,
        model: &mut AssetAllocationModel,
    ) -> AllocationResult<()> {
        let mut normalizer = CurrencyNormalizer::new(self.prices, &model.base_currency);
        for idx in model.holding_indices() {
            let (value, currency) = {
                let holding = model.holding(idx);
                let value = holding
                    .native_value()
                    .ok_or_else(|| AllocationError::Overflow {
                        context: model.holding_fullname(idx),
                    })?;
                (value, holding.native_currency.clone())
            };
            let converted = match normalizer.to_base(value, &currency).await {
                Ok(converted) => converted,
                Err(AllocationError::RateUnavailable { currency })
                    if self.rate_policy == RatePolicy::Zero =>
                {
                    warn!(
                        holding = %model.holding_fullname(idx),
                        %currency,
                        "No exchange rate found, valuing holding at zero"
                    );
                    model.holding_mut(idx).rate_missing = true;
                    Decimal::ZERO
                }
                Err(e) => return Err(e),
            };
            model.holding_mut(idx).value_in_base_currency = Some(converted);
        }
        Ok(())
    }
}

/// Class tree with targets only, read from `store`. Needs neither a ledger nor prices, which is
/// all that target validation looks at.
pub async fn load_targets(
    store: &dyn AllocationStore,
    base_currency: &str,
) -> AllocationResult<AssetAllocationModel> {
    let mut records = store.list_classes().await?;
    sort_class_records(&mut records);

    let mut model = AssetAllocationModel::new(base_currency);
    let mut indices = Vec::with_capacity(records.len());
    for record in &records {
        let class = AssetClass::new(
            record.id,
            &record.name,
            record.target_allocation,
            record.sort_order,
        );
        indices.push(model.add_class(class)?);
    }

    for (record, idx) in records.iter().zip(indices) {
        let parent = match record.parent_id {
            Some(parent_id) => Some(model.class_by_id(parent_id).ok_or_else(|| {
                AllocationError::Integrity(format!(
                    "asset class {} ({}) references missing parent {}",
                    record.id, record.name, parent_id
                ))
            })?),
            None => None,
        };
        model.attach_class(idx, parent);
    }

    let order = model.pre_order();
    if order.len() != model.class_count() {
        let unreachable: Vec<String> = model
            .class_indices()
            .filter(|idx| !order.contains(idx))
            .map(|idx| model.class(idx).name.clone())
            .collect();
        return Err(AllocationError::Integrity(format!(
            "asset classes form a cycle: {}",
            unreachable.join(", ")
        )));
    }
    for idx in order {
        let depth = model
            .class(idx)
            .parent
            .map_or(0, |parent| model.class(parent).depth + 1);
        model.class_mut(idx).depth = depth;
    }

    debug!(classes = model.class_count(), "Loaded asset class skeleton");
    Ok(model)
}

fn stock_symbols(model: &AssetAllocationModel) -> Vec<(HoldingIndex, String)> {
    model
        .holding_indices()
        .filter(|idx| model.holding(*idx).is_stock())
        .map(|idx| (idx, model.holding(idx).symbol.clone()))
        .collect()
}

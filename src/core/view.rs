//! Flattens a computed allocation tree into display rows.

use crate::core::error::{AllocationError, AllocationResult};
use crate::core::model::{AssetAllocationModel, ClassIndex, HoldingIndex, HoldingKind};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Class,
    Stock,
    Cash,
}

/// One line of the allocation report.
///
/// Holdings carry no targets, so the target and expected columns are empty for them and the
/// native value and currency are filled instead. A holding's current allocation is its share of
/// the owning class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRow {
    pub depth: usize,
    pub kind: RowKind,
    pub name: String,
    pub target_allocation: Option<Decimal>,
    pub current_allocation: Decimal,
    pub allocation_diff: Option<Decimal>,
    pub expected_value: Option<Decimal>,
    pub current_value: Decimal,
    pub value_diff: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Valued with a substitute price or rate.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub estimated: bool,
}

impl ViewRow {
    pub fn is_holding(&self) -> bool {
        self.kind != RowKind::Class
    }
}

/// Lists classes depth-first, parents before children. With `include_holdings` each class's
/// holdings follow its own row, ahead of its child classes.
pub fn linearize(
    model: &AssetAllocationModel,
    include_holdings: bool,
) -> AllocationResult<Vec<ViewRow>> {
    if !model.is_computed() {
        return Err(AllocationError::NotComputed);
    }

    let mut rows = Vec::with_capacity(model.class_count());
    for &root in model.roots() {
        push_class(model, root, include_holdings, &mut rows);
    }
    Ok(rows)
}

fn push_class(
    model: &AssetAllocationModel,
    idx: ClassIndex,
    include_holdings: bool,
    rows: &mut Vec<ViewRow>,
) {
    let class = model.class(idx);
    let metrics = &class.metrics;
    rows.push(ViewRow {
        depth: class.depth,
        kind: RowKind::Class,
        name: class.name.clone(),
        target_allocation: Some(class.target_allocation),
        current_allocation: metrics.current_allocation_pct,
        allocation_diff: Some(metrics.allocation_diff_pct),
        expected_value: Some(metrics.expected_value),
        current_value: metrics.current_value,
        value_diff: Some(metrics.value_diff),
        native_value: None,
        currency: None,
        estimated: false,
    });

    if include_holdings {
        for &holding in &class.holdings {
            rows.push(holding_row(model, holding, class.depth + 1));
        }
    }

    for &child in &class.children {
        push_class(model, child, include_holdings, rows);
    }
}

fn holding_row(model: &AssetAllocationModel, idx: HoldingIndex, depth: usize) -> ViewRow {
    let holding = model.holding(idx);
    let (kind, estimated) = match holding.kind {
        HoldingKind::Stock { price_missing, .. } => {
            (RowKind::Stock, price_missing || holding.rate_missing)
        }
        HoldingKind::CashBalance { .. } => (RowKind::Cash, holding.rate_missing),
    };
    ViewRow {
        depth,
        kind,
        name: holding.symbol.clone(),
        target_allocation: None,
        current_allocation: holding.metrics.current_allocation_pct,
        allocation_diff: None,
        expected_value: None,
        current_value: holding.value_in_base_currency.unwrap_or_default(),
        value_diff: None,
        native_value: holding.native_value(),
        currency: Some(holding.native_currency.clone()),
        estimated,
    }
}

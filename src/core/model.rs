//! The allocation tree: asset classes, the holdings under them and the model that owns both.
//!
//! Classes and holdings live in arenas owned by [`AssetAllocationModel`]. Parent links and the
//! holding → class link are plain indices, so the only ownership edge runs from the model down.

use crate::core::error::{AllocationError, AllocationResult};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// Identifier of an asset class in the allocation-target store.
pub type ClassId = i64;

/// Position of a class in the model's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassIndex(usize);

/// Position of a holding in the model's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HoldingIndex(usize);

/// Values derived by the aggregation engine for a class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassMetrics {
    pub current_value: Decimal,
    pub current_allocation_pct: Decimal,
    pub expected_value: Decimal,
    pub allocation_diff_pct: Decimal,
    pub value_diff: Decimal,
    /// Allocation difference relative to the target itself, in percent.
    pub relative_diff_pct: Decimal,
}

/// Values derived by the aggregation engine for a holding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HoldingMetrics {
    /// Share of the owning class.
    pub current_allocation_pct: Decimal,
    /// Share of the whole portfolio.
    pub portfolio_allocation_pct: Decimal,
}

#[derive(Debug, Clone)]
pub struct AssetClass {
    pub id: ClassId,
    pub name: String,
    pub parent: Option<ClassIndex>,
    pub target_allocation: Decimal,
    pub sort_order: i64,
    pub depth: usize,
    pub children: Vec<ClassIndex>,
    pub holdings: Vec<HoldingIndex>,
    pub metrics: ClassMetrics,
}

impl AssetClass {
    pub fn new(id: ClassId, name: &str, target_allocation: Decimal, sort_order: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            parent: None,
            target_allocation,
            sort_order,
            depth: 0,
            children: Vec::new(),
            holdings: Vec::new(),
            metrics: ClassMetrics::default(),
        }
    }

    /// A class with child classes. Leaf classes are the ones that carry holdings.
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingKind {
    Stock {
        quantity: Decimal,
        last_price: Decimal,
        /// The price feed had nothing for this symbol and a unit price was used.
        price_missing: bool,
    },
    CashBalance {
        balance: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct Holding {
    /// Security symbol for stocks, currency code for cash balances.
    pub symbol: String,
    pub kind: HoldingKind,
    pub native_currency: String,
    pub value_in_base_currency: Option<Decimal>,
    /// No exchange rate was available and the holding was valued at zero.
    pub rate_missing: bool,
    pub owning_class: ClassIndex,
    pub metrics: HoldingMetrics,
}

impl Holding {
    pub fn stock(symbol: &str, currency: &str, owning_class: ClassIndex) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind: HoldingKind::Stock {
                quantity: Decimal::ZERO,
                last_price: Decimal::ZERO,
                price_missing: false,
            },
            native_currency: currency.to_string(),
            value_in_base_currency: None,
            rate_missing: false,
            owning_class,
            metrics: HoldingMetrics::default(),
        }
    }

    pub fn cash(currency: &str, balance: Decimal, owning_class: ClassIndex) -> Self {
        Self {
            symbol: currency.to_string(),
            kind: HoldingKind::CashBalance { balance },
            native_currency: currency.to_string(),
            value_in_base_currency: None,
            rate_missing: false,
            owning_class,
            metrics: HoldingMetrics::default(),
        }
    }

    /// Value in the holding's own currency. For stocks this is always quantity times price,
    /// `None` when that product does not fit a `Decimal`.
    pub fn native_value(&self) -> Option<Decimal> {
        match &self.kind {
            HoldingKind::Stock {
                quantity,
                last_price,
                ..
            } => quantity.checked_mul(*last_price),
            HoldingKind::CashBalance { balance } => Some(*balance),
        }
    }

    pub fn is_stock(&self) -> bool {
        matches!(self.kind, HoldingKind::Stock { .. })
    }
}

/// Aggregate root of one allocation snapshot.
#[derive(Debug, Clone)]
pub struct AssetAllocationModel {
    pub base_currency: String,
    pub total_portfolio_value: Decimal,
    roots: Vec<ClassIndex>,
    classes: Vec<AssetClass>,
    holdings: Vec<Holding>,
    index: HashMap<ClassId, ClassIndex>,
    computed: bool,
}

impl AssetAllocationModel {
    pub fn new(base_currency: &str) -> Self {
        Self {
            base_currency: base_currency.to_string(),
            total_portfolio_value: Decimal::ZERO,
            roots: Vec::new(),
            classes: Vec::new(),
            holdings: Vec::new(),
            index: HashMap::new(),
            computed: false,
        }
    }

    /// Adds a detached class to the arena. Ids must be unique within a model.
    pub fn add_class(&mut self, class: AssetClass) -> AllocationResult<ClassIndex> {
        if self.index.contains_key(&class.id) {
            return Err(AllocationError::Integrity(format!(
                "duplicate asset class id {}",
                class.id
            )));
        }
        let idx = ClassIndex(self.classes.len());
        self.index.insert(class.id, idx);
        self.classes.push(class);
        self.computed = false;
        Ok(idx)
    }

    /// Appends `child` to the children of `parent`, or to the top level when `parent` is `None`.
    pub fn attach_class(&mut self, child: ClassIndex, parent: Option<ClassIndex>) {
        match parent {
            Some(p) => {
                self.classes[p.0].children.push(child);
                self.classes[child.0].parent = Some(p);
            }
            None => {
                self.roots.push(child);
                self.classes[child.0].parent = None;
            }
        }
        self.computed = false;
    }

    pub fn attach_holding(&mut self, holding: Holding) -> HoldingIndex {
        let idx = HoldingIndex(self.holdings.len());
        let owner = holding.owning_class;
        self.holdings.push(holding);
        self.classes[owner.0].holdings.push(idx);
        self.computed = false;
        idx
    }

    pub fn roots(&self) -> &[ClassIndex] {
        &self.roots
    }

    pub fn class(&self, idx: ClassIndex) -> &AssetClass {
        &self.classes[idx.0]
    }

    pub(crate) fn class_mut(&mut self, idx: ClassIndex) -> &mut AssetClass {
        self.computed = false;
        &mut self.classes[idx.0]
    }

    pub fn holding(&self, idx: HoldingIndex) -> &Holding {
        &self.holdings[idx.0]
    }

    pub(crate) fn holding_mut(&mut self, idx: HoldingIndex) -> &mut Holding {
        self.computed = false;
        &mut self.holdings[idx.0]
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Every class in arena order.
    pub fn class_indices(&self) -> impl Iterator<Item = ClassIndex> + use<> {
        (0..self.classes.len()).map(ClassIndex)
    }

    /// Every holding in attachment order.
    pub fn holding_indices(&self) -> impl Iterator<Item = HoldingIndex> + use<> {
        (0..self.holdings.len()).map(HoldingIndex)
    }

    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.iter()
    }

    pub fn class_by_id(&self, id: ClassId) -> Option<ClassIndex> {
        self.index.get(&id).copied()
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassIndex> {
        self.class_indices()
            .find(|idx| self.class(*idx).name.eq_ignore_ascii_case(name))
    }

    /// The class that receives cash balances, matched by name regardless of case.
    pub fn cash_class(&self) -> Option<ClassIndex> {
        self.class_by_name("cash")
    }

    /// Classes parent-before-children, siblings in sort order.
    pub fn pre_order(&self) -> Vec<ClassIndex> {
        let mut order = Vec::with_capacity(self.classes.len());
        let mut stack: Vec<ClassIndex> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.class(idx).children.iter().rev().copied());
        }
        order
    }

    /// Colon-separated path of names from the top level, e.g. `Equity:International`.
    pub fn fullname(&self, idx: ClassIndex) -> String {
        let mut names = vec![self.class(idx).name.as_str()];
        let mut cursor = self.class(idx).parent;
        while let Some(parent) = cursor {
            names.push(self.class(parent).name.as_str());
            cursor = self.class(parent).parent;
        }
        names.reverse();
        names.join(":")
    }

    pub fn holding_fullname(&self, idx: HoldingIndex) -> String {
        let holding = self.holding(idx);
        format!("{}:{}", self.fullname(holding.owning_class), holding.symbol)
    }

    pub fn is_computed(&self) -> bool {
        self.computed
    }

    pub(crate) fn set_computed(&mut self) {
        self.computed = true;
    }
}

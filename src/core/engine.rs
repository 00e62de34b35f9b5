//! Aggregation of a loaded allocation tree: value rollup, expected values, drift and
//! validation of the target percentages.

use crate::core::error::{AllocationError, AllocationResult, ValidationFailure};
use crate::core::model::{AssetAllocationModel, ClassIndex};
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Computes every derived field of `model` in place.
///
/// Fields are assigned, never accumulated, so computing twice gives the same result. Structural
/// problems are detected before any field is written, so a failed run leaves no half-computed
/// tree behind.
pub fn compute(model: &mut AssetAllocationModel) -> AllocationResult<()> {
    check_populated(model)?;

    let order = model.pre_order();

    // Reverse pre-order visits every child before its parent.
    for &idx in order.iter().rev() {
        let value = rollup(model, idx)?;
        model.class_mut(idx).metrics.current_value = value;
    }

    let mut total = Decimal::ZERO;
    for &root in model.roots() {
        total = total
            .checked_add(model.class(root).metrics.current_value)
            .ok_or_else(|| AllocationError::Overflow {
                context: "total portfolio value".to_string(),
            })?;
    }
    model.total_portfolio_value = total;

    for &idx in &order {
        let target = model.class(idx).target_allocation;
        let current_value = model.class(idx).metrics.current_value;
        let overflow = || AllocationError::Overflow {
            context: model.fullname(idx),
        };

        // Expected values are shares of the grand total, not of the parent.
        let expected_value = total
            .checked_mul(target)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(overflow)?;
        let current_allocation_pct = percentage(current_value, total).ok_or_else(overflow)?;
        let allocation_diff_pct = current_allocation_pct
            .checked_sub(target)
            .ok_or_else(overflow)?;
        let value_diff = current_value
            .checked_sub(expected_value)
            .ok_or_else(overflow)?;
        let relative_diff_pct = percentage(allocation_diff_pct, target).ok_or_else(overflow)?;

        let metrics = &mut model.class_mut(idx).metrics;
        metrics.expected_value = expected_value;
        metrics.current_allocation_pct = current_allocation_pct;
        metrics.allocation_diff_pct = allocation_diff_pct;
        metrics.value_diff = value_diff;
        metrics.relative_diff_pct = relative_diff_pct;
    }

    for idx in model.holding_indices() {
        let holding = model.holding(idx);
        let value = holding.value_in_base_currency.unwrap_or_default();
        let class_value = model.class(holding.owning_class).metrics.current_value;
        let overflow = || AllocationError::Overflow {
            context: model.holding_fullname(idx),
        };
        let current_allocation_pct = percentage(value, class_value).ok_or_else(overflow)?;
        let portfolio_allocation_pct = percentage(value, total).ok_or_else(overflow)?;

        let metrics = &mut model.holding_mut(idx).metrics;
        metrics.current_allocation_pct = current_allocation_pct;
        metrics.portfolio_allocation_pct = portfolio_allocation_pct;
    }

    model.set_computed();
    debug!(total = %total, currency = %model.base_currency, "Allocation computed");
    Ok(())
}

/// `part` as a percentage of `whole`, zero when `whole` is zero and `None` on overflow.
fn percentage(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        Some(Decimal::ZERO)
    } else {
        part.checked_mul(Decimal::ONE_HUNDRED)?.checked_div(whole)
    }
}

fn rollup(model: &AssetAllocationModel, idx: ClassIndex) -> AllocationResult<Decimal> {
    let class = model.class(idx);
    let overflow = || AllocationError::Overflow {
        context: model.fullname(idx),
    };

    let mut sum = Decimal::ZERO;
    if class.is_group() {
        for child in &class.children {
            sum = sum
                .checked_add(model.class(*child).metrics.current_value)
                .ok_or_else(overflow)?;
        }
    } else {
        for holding in &class.holdings {
            let value = model
                .holding(*holding)
                .value_in_base_currency
                .unwrap_or_default();
            sum = sum.checked_add(value).ok_or_else(overflow)?;
        }
    }
    Ok(sum)
}

fn check_populated(model: &AssetAllocationModel) -> AllocationResult<()> {
    for idx in model.class_indices() {
        let class = model.class(idx);
        if class.is_group() && !class.holdings.is_empty() {
            return Err(AllocationError::MixedClass {
                class: model.fullname(idx),
            });
        }
    }
    for idx in model.holding_indices() {
        if model.holding(idx).value_in_base_currency.is_none() {
            return Err(AllocationError::MissingBaseValue {
                holding: model.holding_fullname(idx),
            });
        }
    }
    Ok(())
}

/// Returns the first broken allocation invariant, if any.
///
/// Group classes are checked parent-first against the sum of their direct children's targets,
/// with exact decimal equality. The top-level targets must add up to exactly 100.
pub fn validation_report(model: &AssetAllocationModel) -> Result<(), ValidationFailure> {
    for idx in model.pre_order() {
        let class = model.class(idx);
        if !class.is_group() {
            continue;
        }
        let found: Decimal = class
            .children
            .iter()
            .map(|child| model.class(*child).target_allocation)
            .sum();
        if found != class.target_allocation {
            return Err(ValidationFailure::ChildSum {
                class: model.fullname(idx),
                expected: class.target_allocation,
                found,
            });
        }
    }

    let found: Decimal = model
        .roots()
        .iter()
        .map(|root| model.class(*root).target_allocation)
        .sum();
    if found != Decimal::ONE_HUNDRED {
        return Err(ValidationFailure::TopLevelSum { found });
    }
    Ok(())
}

/// Checks the allocation targets, logging the first mismatch.
pub fn validate(model: &AssetAllocationModel) -> bool {
    match validation_report(model) {
        Ok(()) => true,
        Err(failure) => {
            warn!(%failure, "Allocation targets are inconsistent");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{AssetClass, Holding, HoldingKind};
    use rust_decimal_macros::dec;

    fn add(
        model: &mut AssetAllocationModel,
        id: i64,
        parent: Option<ClassIndex>,
        name: &str,
        target: Decimal,
    ) -> ClassIndex {
        let idx = model
            .add_class(AssetClass::new(id, name, target, id))
            .unwrap();
        model.attach_class(idx, parent);
        idx
    }

    fn add_stock(
        model: &mut AssetAllocationModel,
        owner: ClassIndex,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
    ) {
        let mut holding = Holding::stock(symbol, &model.base_currency.clone(), owner);
        holding.kind = HoldingKind::Stock {
            quantity,
            last_price: price,
            price_missing: false,
        };
        holding.value_in_base_currency = Some(quantity * price);
        model.attach_holding(holding);
    }

    fn equity_and_bonds() -> (AssetAllocationModel, ClassIndex, ClassIndex) {
        let mut model = AssetAllocationModel::new("AUD");
        let equity = add(&mut model, 1, None, "Equity", dec!(60));
        let bonds = add(&mut model, 2, None, "Bonds", dec!(40));
        add_stock(&mut model, equity, "ASX:VHY", dec!(10), dec!(12));
        (model, equity, bonds)
    }

    #[test]
    fn test_equity_and_bonds_scenario() {
        let (mut model, equity, bonds) = equity_and_bonds();

        compute(&mut model).unwrap();

        assert_eq!(model.total_portfolio_value, dec!(120));
        let equity = &model.class(equity).metrics;
        assert_eq!(equity.current_value, dec!(120));
        assert_eq!(equity.current_allocation_pct, dec!(100));
        assert_eq!(equity.expected_value, dec!(72));
        assert_eq!(equity.value_diff, dec!(48));
        assert_eq!(equity.allocation_diff_pct, dec!(40));
        let bonds = &model.class(bonds).metrics;
        assert_eq!(bonds.current_allocation_pct, dec!(0));
        assert_eq!(bonds.allocation_diff_pct, dec!(-40));
        assert_eq!(bonds.expected_value, dec!(48));
        assert_eq!(bonds.value_diff, dec!(-48));
        assert_eq!(bonds.relative_diff_pct, dec!(-100));
        assert!(model.is_computed());
    }

    #[test]
    fn test_compute_is_idempotent() {
        let (mut model, equity, bonds) = equity_and_bonds();

        compute(&mut model).unwrap();
        let first = (
            model.total_portfolio_value,
            model.class(equity).metrics.clone(),
            model.class(bonds).metrics.clone(),
        );
        compute(&mut model).unwrap();

        assert_eq!(first.0, model.total_portfolio_value);
        assert_eq!(first.1, model.class(equity).metrics);
        assert_eq!(first.2, model.class(bonds).metrics);
    }

    #[test]
    fn test_total_is_sum_of_all_holdings_regardless_of_shape() {
        let mut model = AssetAllocationModel::new("AUD");
        let equity = add(&mut model, 1, None, "Equity", dec!(70));
        let domestic = add(&mut model, 2, Some(equity), "Domestic", dec!(30));
        let intl = add(&mut model, 3, Some(equity), "International", dec!(40));
        let developed = add(&mut model, 4, Some(intl), "Developed", dec!(25));
        let emerging = add(&mut model, 5, Some(intl), "Emerging", dec!(15));
        let property = add(&mut model, 6, None, "Property", dec!(30));
        add_stock(&mut model, domestic, "ASX:VAS", dec!(3), dec!(90.5));
        add_stock(&mut model, domestic, "ASX:VHY", dec!(4), dec!(70));
        add_stock(&mut model, developed, "ASX:VGS", dec!(2), dec!(110.25));
        add_stock(&mut model, emerging, "ASX:VGE", dec!(5), dec!(72));
        add_stock(&mut model, property, "ASX:VAP", dec!(1), dec!(88.8));

        compute(&mut model).unwrap();

        let leaf_sum: Decimal = model
            .holdings()
            .map(|h| h.value_in_base_currency.unwrap())
            .sum();
        assert_eq!(model.total_portfolio_value, leaf_sum);
        assert_eq!(
            model.class(intl).metrics.current_value,
            dec!(220.5) + dec!(360)
        );
        assert_eq!(
            model.class(equity).metrics.current_value,
            dec!(271.5) + dec!(280) + dec!(580.5)
        );
    }

    #[test]
    fn test_expected_value_uses_grand_total() {
        let mut model = AssetAllocationModel::new("AUD");
        let fixed = add(&mut model, 1, None, "Fixed", dec!(50));
        let gov = add(&mut model, 2, Some(fixed), "Gov", dec!(10));
        let corp = add(&mut model, 3, Some(fixed), "Corp", dec!(40));
        let equity = add(&mut model, 4, None, "Equity", dec!(50));
        add_stock(&mut model, gov, "GOV", dec!(1), dec!(100));
        add_stock(&mut model, corp, "CORP", dec!(1), dec!(100));
        add_stock(&mut model, equity, "EQ", dec!(1), dec!(800));

        compute(&mut model).unwrap();

        assert_eq!(model.total_portfolio_value, dec!(1000));
        assert_eq!(model.class(gov).metrics.expected_value, dec!(100));
        assert_eq!(model.class(corp).metrics.expected_value, dec!(400));
        assert_eq!(model.class(fixed).metrics.expected_value, dec!(500));
    }

    #[test]
    fn test_zero_total_gives_zero_allocations() {
        let mut model = AssetAllocationModel::new("AUD");
        let equity = add(&mut model, 1, None, "Equity", dec!(100));
        add_stock(&mut model, equity, "ASX:VHY", dec!(0), dec!(12));

        compute(&mut model).unwrap();

        let metrics = &model.class(equity).metrics;
        assert_eq!(model.total_portfolio_value, Decimal::ZERO);
        assert_eq!(metrics.current_allocation_pct, Decimal::ZERO);
        assert_eq!(metrics.allocation_diff_pct, dec!(-100));
        assert_eq!(metrics.expected_value, Decimal::ZERO);
    }

    #[test]
    fn test_holding_ratios() {
        let mut model = AssetAllocationModel::new("AUD");
        let equity = add(&mut model, 1, None, "Equity", dec!(50));
        let bonds = add(&mut model, 2, None, "Bonds", dec!(50));
        add_stock(&mut model, equity, "A", dec!(1), dec!(30));
        add_stock(&mut model, equity, "B", dec!(1), dec!(10));
        add_stock(&mut model, bonds, "C", dec!(1), dec!(60));

        compute(&mut model).unwrap();

        let a = model.holdings().find(|h| h.symbol == "A").unwrap();
        assert_eq!(a.metrics.current_allocation_pct, dec!(75));
        assert_eq!(a.metrics.portfolio_allocation_pct, dec!(30));
    }

    #[test]
    fn test_out_of_range_values_are_an_overflow() {
        let mut model = AssetAllocationModel::new("AUD");
        let equity = add(&mut model, 1, None, "Equity", dec!(100));
        add_stock(&mut model, equity, "ASX:VHY", Decimal::MAX, dec!(1));

        let result = compute(&mut model);

        assert!(matches!(
            result,
            Err(AllocationError::Overflow { context }) if context == "Equity"
        ));
        assert!(!model.is_computed());
    }

    #[test]
    fn test_mixed_class_is_rejected_without_partial_results() {
        let mut model = AssetAllocationModel::new("AUD");
        let equity = add(&mut model, 1, None, "Equity", dec!(100));
        add(&mut model, 2, Some(equity), "Domestic", dec!(100));
        add_stock(&mut model, equity, "ASX:VHY", dec!(1), dec!(5));

        let result = compute(&mut model);

        assert!(matches!(result, Err(AllocationError::MixedClass { class }) if class == "Equity"));
        assert_eq!(model.total_portfolio_value, Decimal::ZERO);
        assert_eq!(model.class(equity).metrics.current_value, Decimal::ZERO);
        assert!(!model.is_computed());
    }

    #[test]
    fn test_unvalued_holding_is_rejected() {
        let mut model = AssetAllocationModel::new("AUD");
        let equity = add(&mut model, 1, None, "Equity", dec!(100));
        model.attach_holding(Holding::stock("ASX:VHY", "USD", equity));

        let result = compute(&mut model);

        assert!(matches!(
            result,
            Err(AllocationError::MissingBaseValue { holding }) if holding == "Equity:ASX:VHY"
        ));
    }

    fn fixed_income() -> (AssetAllocationModel, ClassIndex) {
        let mut model = AssetAllocationModel::new("AUD");
        add(&mut model, 1, None, "Equity", dec!(70));
        let fixed = add(&mut model, 2, None, "Fixed", dec!(30));
        let gov = add(&mut model, 3, Some(fixed), "Gov", dec!(20));
        add(&mut model, 4, Some(fixed), "Corp", dec!(10));
        (model, gov)
    }

    #[test]
    fn test_validate_accepts_consistent_targets() {
        let (model, _) = fixed_income();
        assert!(validate(&model));
        assert_eq!(validation_report(&model), Ok(()));
    }

    #[test]
    fn test_validate_reports_child_sum_mismatch() {
        let (mut model, gov) = fixed_income();
        model.class_mut(gov).target_allocation = dec!(25);

        assert!(!validate(&model));
        assert_eq!(
            validation_report(&model),
            Err(ValidationFailure::ChildSum {
                class: "Fixed".to_string(),
                expected: dec!(30),
                found: dec!(35),
            })
        );
    }

    #[test]
    fn test_validate_checks_nested_groups() {
        let (mut model, gov) = fixed_income();
        add(&mut model, 5, Some(gov), "Short", dec!(5));
        add(&mut model, 6, Some(gov), "Long", dec!(10));

        assert_eq!(
            validation_report(&model),
            Err(ValidationFailure::ChildSum {
                class: "Fixed:Gov".to_string(),
                expected: dec!(20),
                found: dec!(15),
            })
        );
    }

    #[test]
    fn test_validate_requires_top_level_of_one_hundred() {
        let mut model = AssetAllocationModel::new("AUD");
        add(&mut model, 1, None, "Equity", dec!(60));
        add(&mut model, 2, None, "Bonds", dec!(30.5));

        assert!(!validate(&model));
        assert_eq!(
            validation_report(&model),
            Err(ValidationFailure::TopLevelSum { found: dec!(90.5) })
        );
    }
}

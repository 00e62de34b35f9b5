use super::ui;
use crate::core::engine::{validate, validation_report};
use crate::core::model::AssetAllocationModel;
use anyhow::{Result, bail};

/// Checks that every group's children add up to its target and the top level to 100%.
pub fn run(model: &AssetAllocationModel) -> Result<()> {
    if !validate(model) {
        let reason = validation_report(model)
            .err()
            .map(|failure| failure.to_string())
            .unwrap_or_default();
        bail!("Allocation targets are inconsistent: {reason}");
    }
    println!(
        "{}",
        ui::style_text("Allocation targets are consistent", ui::StyleType::Success)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::AssetClass;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn targets(domestic: Decimal) -> AssetAllocationModel {
        let mut model = AssetAllocationModel::new("AUD");
        let mut add = |id, parent, name: &str, target| {
            let idx = model
                .add_class(AssetClass::new(id, name, target, id))
                .unwrap();
            model.attach_class(idx, parent);
            idx
        };
        let equity = add(1, None, "Equity", dec!(70));
        add(2, Some(equity), "Domestic", domestic);
        add(3, Some(equity), "International", dec!(40));
        add(4, None, "Cash", dec!(30));
        model
    }

    #[test]
    fn test_consistent_targets_pass_without_computing() {
        let model = targets(dec!(30));
        assert!(!model.is_computed());
        assert!(run(&model).is_ok());
    }

    #[test_log::test]
    fn test_inconsistent_targets_name_the_class() {
        let err = run(&targets(dec!(30.5))).unwrap_err().to_string();
        assert_eq!(
            err,
            "Allocation targets are inconsistent: \
             The sum of child allocations 70.5 invalid for Equity (expected 70)"
        );
    }
}

use super::ui;
use crate::core::model::AssetAllocationModel;
use crate::core::view::{RowKind, ViewRow, linearize};
use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Cell, Table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Prints the allocation report for a computed model.
pub fn run(model: &AssetAllocationModel, full: bool, format: OutputFormat) -> Result<()> {
    let rows = linearize(model, full)?;
    match format {
        OutputFormat::Table => println!("{}", render_table(model, &rows)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

fn row_label(row: &ViewRow) -> Cell {
    let indent = "  ".repeat(row.depth);
    match row.kind {
        RowKind::Class => Cell::new(format!("{indent}{}", row.name)),
        RowKind::Stock | RowKind::Cash => {
            let mut label = format!("{indent}{}", row.name);
            if let (Some(native), Some(currency)) = (row.native_value, &row.currency) {
                label.push_str(&format!(" ({:.2} {currency})", native.round_dp(2)));
            }
            if row.estimated {
                label.push_str(" *");
            }
            Cell::new(ui::style_text(&label, ui::StyleType::Subtle))
        }
    }
}

pub fn render_table(model: &AssetAllocationModel, rows: &[ViewRow]) -> String {
    let base = model.base_currency.as_str();
    let mut table: Table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Asset Class"),
        ui::header_cell("Target (%)"),
        ui::header_cell("Current (%)"),
        ui::header_cell("Diff (%)"),
        ui::header_cell(&format!("Expected ({base})")),
        ui::header_cell(&format!("Current ({base})")),
        ui::header_cell(&format!("Diff ({base})")),
    ]);

    for row in rows {
        table.add_row(vec![
            row_label(row),
            ui::format_optional_cell(row.target_allocation, |t| format!("{:.2}", t.round_dp(2))),
            ui::amount_cell(row.current_allocation),
            ui::diff_cell(row.allocation_diff, ""),
            ui::format_optional_cell(row.expected_value, |v| format!("{:.2}", v.round_dp(2))),
            ui::amount_cell(row.current_value),
            ui::diff_cell(row.value_diff, ""),
        ]);
    }

    let total = model.total_portfolio_value;
    let mut output = table.to_string();
    output.push_str(&format!(
        "\n\nTotal Value ({}): {}",
        ui::style_text(base, ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", total.round_dp(2)), ui::StyleType::TotalValue)
    ));
    if rows.iter().any(|r| r.estimated) {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                "* valued without a price or exchange rate",
                ui::StyleType::Subtle
            )
        ));
    }
    output
}

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Success,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Success => style(text).green(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Right-aligned amount with two decimals.
pub fn amount_cell(value: Decimal) -> Cell {
    Cell::new(format!("{:.2}", value.round_dp(2))).set_alignment(CellAlignment::Right)
}

/// Formats an `Option<T>` into a `Cell`. `None` leaves the cell blank.
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(Cell::new(""), |v| {
        Cell::new(format_fn(v)).set_alignment(CellAlignment::Right)
    })
}

/// Creates a cell for a signed difference, green when over and red when under.
pub fn diff_cell(diff: Option<Decimal>, suffix: &str) -> Cell {
    let Some(diff) = diff else {
        return Cell::new("");
    };
    let sign = if diff.is_sign_positive() && !diff.is_zero() {
        "+"
    } else {
        ""
    };
    let text = format!("{sign}{:.2}{suffix}", diff.round_dp(2));
    let cell = Cell::new(text).set_alignment(CellAlignment::Right);
    if diff.is_zero() {
        cell
    } else if diff.is_sign_positive() {
        cell.fg(Color::Green)
    } else {
        cell.fg(Color::Red)
    }
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64, with_message: bool) -> ProgressBar {
    let template = if with_message {
        "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    } else {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    };

    let pb = ProgressBar::new(len);
    if let Ok(bar_style) = ProgressStyle::default_bar().template(template) {
        pb.set_style(bar_style.progress_chars("#>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_diff_cell_text() {
        assert_eq!(diff_cell(Some(dec!(1.234)), "%").content(), "+1.23%");
        assert_eq!(diff_cell(Some(dec!(-5)), "").content(), "-5.00");
        assert_eq!(diff_cell(None, "%").content(), "");
    }

    #[test]
    fn test_amount_cell_rounds() {
        assert_eq!(amount_cell(dec!(1234.5678)).content(), "1234.57");
    }
}

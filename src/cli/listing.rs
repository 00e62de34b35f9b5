use super::ui;
use crate::core::config::AppConfig;
use crate::core::sources::{AllocationStore, ClassRecord};
use anyhow::Result;
use comfy_table::Cell;

/// Prints the class records in store order.
pub async fn classes(store: &dyn AllocationStore) -> Result<()> {
    let records = store.list_classes().await?;
    println!("{}", render_classes(&records));
    Ok(())
}

fn render_classes(records: &[ClassRecord]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Parent"),
        ui::header_cell("Name"),
        ui::header_cell("Target (%)"),
        ui::header_cell("Sort"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(record.id),
            ui::format_optional_cell(record.parent_id, |p| p.to_string()),
            Cell::new(&record.name),
            ui::amount_cell(record.target_allocation),
            Cell::new(record.sort_order),
        ]);
    }
    table.to_string()
}

/// Every linked symbol once, sorted.
pub async fn linked_symbols(store: &dyn AllocationStore) -> Result<Vec<String>> {
    let mut symbols: Vec<String> = store
        .list_stock_links()
        .await?
        .into_iter()
        .map(|link| link.symbol)
        .collect();
    symbols.sort();
    symbols.dedup();
    Ok(symbols)
}

pub async fn links(store: &dyn AllocationStore) -> Result<()> {
    for symbol in linked_symbols(store).await? {
        println!("{symbol}");
    }
    Ok(())
}

/// Prints the active configuration as YAML.
pub fn config(config: &AppConfig) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

use super::ui;
use crate::core::sources::{Price, PriceFeed};
use crate::store::pricedb::PriceDb;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricesCommand {
    /// Record a price by hand. Currency and date default to the base currency and today.
    Add {
        symbol: String,
        value: Decimal,
        currency: Option<String>,
        date: Option<NaiveDate>,
    },
    List {
        symbol: Option<String>,
    },
    /// Download the latest quotes for every linked symbol, plus rates for every foreign
    /// currency held as cash or quoted for a symbol.
    Fetch,
}

pub fn add(db: &PriceDb, symbol: &str, price: &Price, date: NaiveDate) -> Result<()> {
    db.add_price(symbol, date, price)?;
    println!(
        "Stored {} {} {} for {}",
        symbol,
        price.value,
        price.currency,
        date.format("%Y-%m-%d")
    );
    Ok(())
}

pub fn list(db: &PriceDb, symbol: Option<&str>) -> Result<()> {
    let entries = db.list(symbol)?;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Date"),
        ui::header_cell("Price"),
        ui::header_cell("Currency"),
    ]);
    for entry in &entries {
        table.add_row(vec![
            Cell::new(&entry.symbol),
            Cell::new(entry.date.format("%Y-%m-%d")),
            Cell::new(entry.price.value).set_alignment(CellAlignment::Right),
            Cell::new(&entry.price.currency),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Outcome of a fetch run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub stored: usize,
    pub not_found: Vec<String>,
    pub failed: Vec<String>,
}

/// Fetches quotes for `symbols`, then exchange rates for every foreign currency among
/// `currencies` and the currencies the quotes came back in, and stores them under `date`.
/// Individual failures are reported and skipped.
pub async fn fetch(
    db: &PriceDb,
    feed: &dyn PriceFeed,
    base_currency: &str,
    symbols: &[String],
    currencies: &[String],
    date: NaiveDate,
) -> Result<FetchSummary> {
    let pb = ui::new_progress_bar(symbols.len() as u64, true);
    pb.set_message("Fetching prices...");

    let price_futures = symbols.iter().map(|symbol| {
        let pb_clone = pb.clone();
        async move {
            let res = feed.latest_price(symbol).await;
            pb_clone.inc(1);
            (symbol.clone(), res)
        }
    });
    let prices = join_all(price_futures).await;

    let quoted = prices
        .iter()
        .filter_map(|(_, res)| res.as_ref().ok()?.as_ref())
        .map(|price| &price.currency);
    let foreign: BTreeSet<String> = currencies
        .iter()
        .chain(quoted)
        .map(|c| c.to_uppercase())
        .filter(|c| !c.eq_ignore_ascii_case(base_currency))
        .collect();

    pb.inc_length(foreign.len() as u64);
    pb.set_message("Fetching exchange rates...");
    let rate_futures = foreign.iter().map(|currency| {
        let pb_clone = pb.clone();
        async move {
            let res = feed.latest_rate(currency).await.map(|rate| {
                rate.map(|value| Price {
                    value,
                    currency: base_currency.to_string(),
                })
            });
            pb_clone.inc(1);
            (PriceDb::rate_symbol(currency), res)
        }
    });
    let rates = join_all(rate_futures).await;
    pb.finish_and_clear();

    let mut summary = FetchSummary::default();
    for (symbol, res) in prices.into_iter().chain(rates) {
        match res {
            Ok(Some(price)) => {
                db.add_price(&symbol, date, &price)?;
                summary.stored += 1;
            }
            Ok(None) => {
                warn!(%symbol, "No quote found");
                summary.not_found.push(symbol);
            }
            Err(e) => {
                warn!(%symbol, error = %e, "Quote request failed");
                summary.failed.push(symbol);
            }
        }
    }
    Ok(summary)
}

pub fn print_summary(summary: &FetchSummary) {
    println!(
        "{} {}",
        ui::style_text("Stored quotes:", ui::StyleType::TotalLabel),
        summary.stored
    );
    if !summary.not_found.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("Not found: {}", summary.not_found.join(", ")),
                ui::StyleType::Subtle
            )
        );
    }
    if !summary.failed.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("Failed: {}", summary.failed.join(", ")),
                ui::StyleType::Error
            )
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBook;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fetch_stores_prices_and_foreign_rates() {
        let dir = tempdir().unwrap();
        let db = PriceDb::open(dir.path()).unwrap();
        let feed = MemoryBook::new()
            .with_price("ASX:VHY", dec!(50), "AUD")
            .with_rate("EUR", dec!(1.6));
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let summary = fetch(
            &db,
            &feed,
            "AUD",
            &["ASX:VHY".to_string(), "ASX:NONE".to_string()],
            &["AUD".to_string(), "EUR".to_string()],
            date,
        )
        .await
        .unwrap();

        assert_eq!(summary.stored, 2);
        assert_eq!(summary.not_found, vec!["ASX:NONE".to_string()]);
        assert!(summary.failed.is_empty());
        assert_eq!(
            db.latest("ASX:VHY").unwrap().unwrap().price.value,
            dec!(50)
        );
        assert_eq!(db.latest_rate("EUR").await.unwrap(), Some(dec!(1.6)));
        assert_eq!(feed.rate_lookups(), 1);
    }

    #[tokio::test]
    async fn test_fetch_adds_rates_for_quoted_currencies() {
        let dir = tempdir().unwrap();
        let db = PriceDb::open(dir.path()).unwrap();
        let feed = MemoryBook::new()
            .with_price("NYSEARCA:VEU", dec!(60.5), "USD")
            .with_rate("USD", dec!(1.5));
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        // No USD cash, the rate is needed for the quote alone.
        let summary = fetch(
            &db,
            &feed,
            "AUD",
            &["NYSEARCA:VEU".to_string()],
            &["AUD".to_string()],
            date,
        )
        .await
        .unwrap();

        assert_eq!(summary.stored, 2);
        assert_eq!(db.latest_rate("USD").await.unwrap(), Some(dec!(1.5)));
        assert_eq!(feed.rate_lookups(), 1);
    }
}

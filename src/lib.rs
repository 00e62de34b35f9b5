pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::classes::ClassesCommand;
use crate::cli::prices::PricesCommand;
use crate::cli::show::OutputFormat;
use crate::core::config::{AppConfig, PriceSource};
use crate::core::engine;
use crate::core::loader::{AssetAllocationLoader, load_targets};
use crate::core::model::AssetAllocationModel;
use crate::core::sources::{Price, PriceFeed};
use crate::providers::YahooPriceFeed;
use crate::store::{AllocationFile, LedgerFile, PriceDb};
use anyhow::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Show { full: bool, format: OutputFormat },
    Validate,
    Classes(ClassesCommand),
    Links,
    Config,
    Prices(PricesCommand),
}

fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

fn yahoo_feed(config: &AppConfig) -> Result<YahooPriceFeed> {
    let yahoo = config.yahoo();
    YahooPriceFeed::new(&yahoo.base_url, &config.currency, yahoo.exchanges)
}

/// Loads the allocation tree from the configured sources and runs the aggregation engine on it.
pub async fn build_model(config: &AppConfig) -> Result<AssetAllocationModel> {
    let store = AllocationFile::load(&config.allocation_path)?;
    let ledger = LedgerFile::load(&config.ledger_path)?;
    let feed: Box<dyn PriceFeed> = match config.prices.source {
        PriceSource::Database => Box::new(PriceDb::open(config.price_db_path()?)?),
        PriceSource::Yahoo => Box::new(yahoo_feed(config)?),
    };

    let loader = AssetAllocationLoader::new(&store, &ledger, feed.as_ref())
        .with_cash_root(config.cash_root.as_deref())
        .with_rate_policy(config.rate_policy);
    let mut model = loader.build(&config.currency).await?;
    engine::compute(&mut model)?;
    Ok(model)
}

async fn run_prices(config: &AppConfig, cmd: PricesCommand) -> Result<()> {
    let db = PriceDb::open(config.price_db_path()?)?;
    match cmd {
        PricesCommand::Add {
            symbol,
            value,
            currency,
            date,
        } => {
            let price = Price {
                value,
                currency: currency.unwrap_or_else(|| config.currency.clone()),
            };
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            cli::prices::add(&db, &symbol, &price, date)
        }
        PricesCommand::List { symbol } => cli::prices::list(&db, symbol.as_deref()),
        PricesCommand::Fetch => {
            let store = AllocationFile::load(&config.allocation_path)?;
            let ledger = LedgerFile::load(&config.ledger_path)?;
            let symbols = cli::listing::linked_symbols(&store).await?;
            let feed = yahoo_feed(config)?;
            let today = chrono::Local::now().date_naive();
            let summary = cli::prices::fetch(
                &db,
                &feed,
                &config.currency,
                &symbols,
                &ledger.currencies(),
                today,
            )
            .await?;
            cli::prices::print_summary(&summary);
            Ok(())
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Asset allocation starting...");
    let config = load_config(config_path)?;

    match command {
        AppCommand::Show { full, format } => {
            let model = build_model(&config).await?;
            cli::show::run(&model, full, format)
        }
        AppCommand::Validate => {
            // Targets only, so missing prices or rates cannot get in the way.
            let store = AllocationFile::load(&config.allocation_path)?;
            let model = load_targets(&store, &config.currency).await?;
            cli::validate::run(&model)
        }
        AppCommand::Classes(cmd) => {
            cli::classes::run(&config.allocation_path, &config.currency, cmd).await
        }
        AppCommand::Links => {
            let store = AllocationFile::load(&config.allocation_path)?;
            cli::listing::links(&store).await
        }
        AppCommand::Config => cli::listing::config(&config),
        AppCommand::Prices(cmd) => run_prices(&config, cmd).await,
    }
}

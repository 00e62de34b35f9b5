use anyhow::Result;
use asset_allocation::AppCommand;
use asset_allocation::cli::classes::ClassesCommand;
use asset_allocation::cli::prices::PricesCommand;
use asset_allocation::cli::show::OutputFormat;
use asset_allocation::core::log::init_logging;
use asset_allocation::store::ClassEdit;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display current against target allocation
    Show {
        /// Include individual holdings under their classes
        #[arg(short, long)]
        full: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Check that every level of the targets adds up to 100%
    Validate,
    /// List or manage the asset classes
    Classes {
        #[command(subcommand)]
        command: Option<ClassesCommands>,
    },
    /// List the securities linked to asset classes
    Links,
    /// Print the active configuration
    Config,
    /// Manage the local price database
    #[command(subcommand)]
    Prices(PricesCommands),
}

#[derive(Subcommand)]
enum ClassesCommands {
    /// List the asset classes
    List,
    /// Add a new asset class
    Add {
        name: String,
        /// Id of the parent class, top level when omitted
        #[arg(short, long)]
        parent: Option<i64>,
        /// Target allocation in percent of the whole portfolio
        #[arg(short, long, default_value_t = Decimal::ZERO)]
        alloc: Decimal,
    },
    /// Edit an asset class
    Edit {
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        /// Move under another class
        #[arg(short, long)]
        parent: Option<i64>,
        /// Set the target allocation
        #[arg(short, long)]
        alloc: Option<Decimal>,
    },
    /// Delete an asset class without children
    Delete { id: i64 },
}

impl From<ClassesCommands> for ClassesCommand {
    fn from(cmd: ClassesCommands) -> ClassesCommand {
        match cmd {
            ClassesCommands::List => ClassesCommand::List,
            ClassesCommands::Add {
                name,
                parent,
                alloc,
            } => ClassesCommand::Add {
                name,
                parent_id: parent,
                target_allocation: alloc,
            },
            ClassesCommands::Edit {
                id,
                name,
                parent,
                alloc,
            } => ClassesCommand::Edit {
                id,
                edit: ClassEdit {
                    name,
                    parent_id: parent,
                    target_allocation: alloc,
                },
            },
            ClassesCommands::Delete { id } => ClassesCommand::Delete { id },
        }
    }
}

#[derive(Subcommand)]
enum PricesCommands {
    /// Record a price
    Add {
        symbol: String,
        value: Decimal,
        /// Price currency, defaults to the base currency
        #[arg(long)]
        currency: Option<String>,
        /// Price date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List stored prices
    List { symbol: Option<String> },
    /// Download latest prices and exchange rates
    Fetch,
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Show { full, format } => AppCommand::Show { full, format },
            Commands::Validate => AppCommand::Validate,
            Commands::Classes { command } => {
                AppCommand::Classes(command.map_or(ClassesCommand::List, Into::into))
            }
            Commands::Links => AppCommand::Links,
            Commands::Config => AppCommand::Config,
            Commands::Prices(PricesCommands::Add {
                symbol,
                value,
                currency,
                date,
            }) => AppCommand::Prices(PricesCommand::Add {
                symbol,
                value,
                currency,
                date,
            }),
            Commands::Prices(PricesCommands::List { symbol }) => {
                AppCommand::Prices(PricesCommand::List { symbol })
            }
            Commands::Prices(PricesCommands::Fetch) => AppCommand::Prices(PricesCommand::Fetch),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => asset_allocation::cli::setup::setup_at_path(path),
            None => asset_allocation::cli::setup::setup(),
        },
        Some(cmd) => asset_allocation::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

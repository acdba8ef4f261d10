//! orderdb CLI
//!
//! Command-line front-end for an orderdb database file:
//! - Add, edit and remove orders
//! - Look orders up by id, address, date or weight
//! - Back up, restore and export
//!
//! Every mutating command backs the database up first, applies the change
//! and saves. Dates are entered as `dd.MM.yyyy`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use orderdb::config::{generate_default_config, Config, LoggingConfig};
use orderdb::storage::{parse_date, Database, Order, OrderId};
use orderdb::CsvExporter;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "orderdb")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Indexed shipment-order database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add an order
    Add {
        #[arg(allow_negative_numbers = true)]
        id: OrderId,
        address: String,
        /// Date as dd.MM.yyyy
        date: String,
        weight: String,
    },

    /// Replace the address, date and weight of an order
    Edit {
        #[arg(allow_negative_numbers = true)]
        id: OrderId,
        address: String,
        /// Date as dd.MM.yyyy
        date: String,
        weight: String,
    },

    /// Remove orders
    Remove {
        #[command(subcommand)]
        by: Selector,
    },

    /// Find orders
    Find {
        #[command(subcommand)]
        by: Selector,
    },

    /// List all orders
    List,

    /// Show record and index counts
    Stats,

    /// Remove every order
    Clear,

    /// Write the backup file
    Backup,

    /// Replace the database with the backup file
    Restore,

    /// Export all orders as CSV
    Export {
        /// Output file
        path: PathBuf,
        /// Field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,
        /// Omit the header row
        #[arg(long)]
        no_header: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Which field to match on
#[derive(Subcommand)]
pub enum Selector {
    /// Match by id
    Id {
        #[arg(allow_negative_numbers = true)]
        id: OrderId,
    },
    /// Match by exact address
    Address { address: String },
    /// Match by date (dd.MM.yyyy)
    Date { date: String },
    /// Match by exact weight
    Weight { weight: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // [logging] is not known until the config is loaded
    let mut config = with_bootstrap_logging(std::io::stderr, || match &cli.config {
        Some(path) => Config::load_with_env(path),
        None => Ok(Config::load_default()),
    })?;
    if let Some(db_path) = cli.db {
        config.storage.db_path = db_path;
    }

    init_logging(&config.logging)?;

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                // Create parent directory if needed
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &content)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut db = Database::open(&config.storage)
        .with_context(|| format!("Failed to open database {:?}", config.storage.db_path))?;
    tracing::debug!(path = ?db.primary_path(), stats = %db.store().stats(), "Database opened");

    match cli.command {
        Commands::Add {
            id,
            address,
            date,
            weight,
        } => {
            let order = Order::new(id, address, parse_date_arg(&date)?, parse_weight_arg(&weight)?);
            if !db.with_backup(|store| store.add(order))? {
                bail!("Order {} already exists", id);
            }
            db.save()?;
            println!("Added order {}", id);
        }

        Commands::Edit {
            id,
            address,
            date,
            weight,
        } => {
            let date = parse_date_arg(&date)?;
            let weight = parse_weight_arg(&weight)?;
            if !db.with_backup(|store| store.edit(id, address, date, weight))? {
                bail!("Order {} not found", id);
            }
            db.save()?;
            println!("Updated order {}", id);
        }

        Commands::Remove { by } => {
            let removed = match by {
                Selector::Id { id } => {
                    usize::from(db.with_backup(|store| store.remove(id))?.is_some())
                }
                Selector::Address { address } => {
                    db.with_backup(|store| store.remove_by_address(&address))?
                }
                Selector::Date { date } => {
                    let date = parse_date_arg(&date)?;
                    db.with_backup(|store| store.remove_by_date(date))?
                }
                Selector::Weight { weight } => {
                    let weight = parse_weight_arg(&weight)?;
                    db.with_backup(|store| store.remove_by_weight(weight))?
                }
            };
            db.save()?;
            println!("Removed {} order(s)", removed);
        }

        Commands::Find { by } => {
            let store = db.store();
            let orders = match by {
                Selector::Id { id } => store.find_by_id(id).cloned().into_iter().collect(),
                Selector::Address { address } => store.find_by_address(&address),
                Selector::Date { date } => store.find_by_date(parse_date_arg(&date)?),
                Selector::Weight { weight } => store.find_by_weight(parse_weight_arg(&weight)?),
            };
            print_orders(&orders, &cli.format)?;
        }

        Commands::List => {
            print_orders(&db.store().all_records(), &cli.format)?;
        }

        Commands::Stats => {
            let stats = db.store().stats();
            if cli.format == "json" {
                let value = serde_json::json!({
                    "records": stats.records,
                    "addresses": stats.addresses,
                    "dates": stats.dates,
                    "weights": stats.weights,
                    "path": db.primary_path(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Database: {}", db.primary_path().display());
                println!("  Orders:    {}", stats.records);
                println!("  Addresses: {}", stats.addresses);
                println!("  Dates:     {}", stats.dates);
                println!("  Weights:   {}", stats.weights);
            }
        }

        Commands::Clear => {
            db.with_backup(|store| store.clear())?;
            db.save()?;
            println!("Cleared database (backup at {})", db.backup_path().display());
        }

        Commands::Backup => {
            db.backup()?;
            println!("Backup written to {}", db.backup_path().display());
        }

        Commands::Restore => {
            let report = db
                .restore()
                .with_context(|| format!("Failed to restore from {:?}", db.backup_path()))?;
            db.save()?;
            println!("Restored {} order(s)", report.loaded);
            if report.duplicates > 0 {
                println!("  Skipped {} duplicate id(s)", report.duplicates);
            }
        }

        Commands::Export {
            path,
            delimiter,
            no_header,
        } => {
            let delimiter = u8::try_from(delimiter)
                .with_context(|| format!("Delimiter must be a single-byte character: {:?}", delimiter))?;
            let rows = CsvExporter::new()
                .with_delimiter(delimiter)
                .with_header(!no_header)
                .export_to_path(db.store(), &path)?;
            println!("Exported {} order(s) to {:?}", rows, path);
        }

        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("orderdb={}", config.level).into());

    let writer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = config.file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .init();
    }

    Ok(())
}

/// Run `f` with a temporary subscriber writing warnings to `writer`
fn with_bootstrap_logging<W, T>(writer: W, f: impl FnOnce() -> T) -> T
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orderdb=warn".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

fn parse_date_arg(s: &str) -> anyhow::Result<chrono::NaiveDate> {
    parse_date(s).with_context(|| format!("Invalid date {:?}, expected dd.MM.yyyy", s))
}

fn parse_weight_arg(s: &str) -> anyhow::Result<f64> {
    let weight: f64 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid weight {:?}", s))?;
    if !weight.is_finite() || weight <= 0.0 {
        bail!("Weight must be a positive number, got {}", weight);
    }
    Ok(weight)
}

fn print_orders(orders: &[Order], format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(orders)?);
        return Ok(());
    }

    if orders.is_empty() {
        println!("No orders found");
        return Ok(());
    }

    println!("{:<10} {:<30} {:<12} {}", "ID", "Address", "Date", "Weight");
    println!("{}", "-".repeat(64));
    for order in orders {
        println!(
            "{:<10} {:<30} {:<12} {}",
            order.id,
            order.address,
            order.formatted_date(),
            order.weight
        );
    }

    Ok(())
}

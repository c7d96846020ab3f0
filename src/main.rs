use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use perftrack_lib::db::{PerfDb, PerformanceRecord, RecordInput};
use perftrack_lib::state::load_config;
use perftrack_lib::{db_backup, legacy};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database file to use instead of the configured one
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write every record and summary to a snapshot file
    Export { path: PathBuf },
    /// Write a timestamped snapshot into the backup directory
    Backup,
    /// Replace all data with the contents of a snapshot file
    Import { path: PathBuf },
    /// Recompute growth for every person
    Recalculate,
    /// List periods that have records, newest first
    Periods,
    /// List registered names
    Names {
        /// Include deactivated names
        #[arg(long)]
        all: bool,
    },
    /// Show the records of one period
    ShowPeriod { period: String },
    /// Show a person's history, newest first
    ShowPerson { name: String },
    /// Print a period's summary, or replace it with --set
    Summary {
        period: String,
        #[arg(long)]
        set: Option<String>,
    },
    /// Insert or replace a single record
    Set {
        period: String,
        name: String,
        left: f64,
        right: f64,
        #[arg(long, default_value = "0")]
        left_orders: i64,
        #[arg(long, default_value = "0")]
        right_orders: i64,
        #[arg(long, default_value = "")]
        position: String,
        #[arg(long)]
        sort_order: Option<i64>,
    },
    /// Delete one person's record for a period
    Delete { name: String, period: String },
    /// Add a name to the registry
    Register { name: String },
    /// Hide a name from the active list
    Deactivate { name: String },
    /// Restore a deactivated name
    Activate { name: String },
    /// Move all of a person's records to a new name
    Rename { old: String, new: String },
    /// Convert a previous-data CSV into a snapshot file
    ConvertLegacy { input: PathBuf, output: PathBuf },
}

fn print_records(records: &[PerformanceRecord]) {
    for r in records {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.2}%\t{:.2}%\t{:.2}%",
            r.period,
            r.name,
            r.left_value,
            r.right_value,
            r.left_orders,
            r.right_orders,
            r.left_growth_pct,
            r.right_growth_pct,
            r.total_growth_pct
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Conversion never touches the store.
    if let Commands::ConvertLegacy { input, output } = &cli.command {
        let count = legacy::convert_file(input, output)
            .with_context(|| format!("Failed to convert {}", input.display()))?;
        println!("Converted {} records into {}", count, output.display());
        return Ok(());
    }

    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;
    let db = match &cli.db {
        Some(path) => {
            let mut db = PerfDb::open_at(path.clone())
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            db.set_auto_backup(config.auto_backup_path()?);
            db
        }
        None => PerfDb::open(&config).context("Failed to open database")?,
    };

    match cli.command {
        Commands::Export { path } => {
            let count = db_backup::export_snapshot(&db, &path)?;
            println!("Exported {} records to {}", count, path.display());
        }
        Commands::Backup => {
            let path = db_backup::manual_backup_path(&config.backup_dir()?);
            let count = db_backup::export_snapshot(&db, &path)?;
            println!("Backed up {} records to {}", count, path.display());
        }
        Commands::Import { path } => {
            let report = db_backup::import_snapshot(&db, &path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Recalculate => {
            let count = db.recalculate_all()?;
            println!("Recalculated growth for {} records", count);
        }
        Commands::Periods => {
            for period in db.distinct_periods()? {
                println!("{}", period);
            }
        }
        Commands::Names { all } => {
            for name in db.list_names(!all)?.into_iter().filter(|n| !n.is_empty()) {
                println!("{}", name);
            }
        }
        Commands::ShowPeriod { period } => print_records(&db.get_by_period(&period)?),
        Commands::ShowPerson { name } => print_records(&db.get_all_by_name(&name)?),
        Commands::Summary { period, set } => match set {
            Some(text) => db.save_summary(&period, &text)?,
            None => println!("{}", db.get_summary(&period)?),
        },
        Commands::Set {
            period,
            name,
            left,
            right,
            left_orders,
            right_orders,
            position,
            sort_order,
        } => {
            let mut input = RecordInput::new(&name, left, right)
                .with_orders(left_orders, right_orders)
                .with_position(&position);
            input.sort_order = sort_order;
            db.upsert_single(&period, &input)?;
        }
        Commands::Delete { name, period } => {
            let deleted = db.delete_record(&name, &period)?;
            if deleted == 0 {
                println!("No record for {} in {}", name, period);
            }
        }
        Commands::Register { name } => {
            if !db.register_name(&name)? {
                println!("{} is already registered", name.trim());
            }
        }
        Commands::Deactivate { name } => db.deactivate_name(&name)?,
        Commands::Activate { name } => db.activate_name(&name)?,
        Commands::Rename { old, new } => {
            let count = db.rename_person(&old, &new)?;
            println!("Renamed {} records from {} to {}", count, old, new);
        }
        Commands::ConvertLegacy { .. } => {}
    }

    Ok(())
}

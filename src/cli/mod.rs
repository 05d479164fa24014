pub mod inspect;
pub mod run;
pub mod schema;
pub mod schema_init;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::dimensions::KeyMode;
use crate::error::Result;
use crate::fmt::{amount, count};
use crate::pipeline::{RunOptions, RunSummary};
use crate::settings::DbConfig;
use crate::source::SourceSchema;

#[derive(Parser)]
#[command(
    name = "nuga-etl",
    about = "Flatten a bank-transaction CSV into a customer/transaction/employee star schema."
)]
pub struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read, clean and normalize FILE, reset the destination schema, then load it.
    Run {
        /// Path to the source CSV (header row required)
        file: String,
        /// SQLite database file (overrides DB_NAME and settings.json)
        #[arg(long)]
        database: Option<String>,
        /// Rows per INSERT statement
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,
        /// One dimension row per source row, as the legacy job did. Repeated
        /// natural keys then multiply fact rows.
        #[arg(long = "per-row-keys")]
        per_row_keys: bool,
        /// JSON column declaration to use instead of the built-in one
        #[arg(long)]
        schema: Option<String>,
    },
    /// Transform FILE and report what would be loaded, without a database.
    Inspect {
        /// Path to the source CSV
        file: String,
        #[arg(long = "per-row-keys")]
        per_row_keys: bool,
        #[arg(long)]
        schema: Option<String>,
    },
    /// Drop and recreate the four destination tables.
    SchemaInit {
        #[arg(long)]
        database: Option<String>,
    },
    /// Print the built-in source column declaration as JSON.
    Schema,
}

pub(crate) fn run_options(file: &str, schema: Option<&str>, per_row_keys: bool) -> Result<RunOptions> {
    let mut options = RunOptions::new(PathBuf::from(file));
    if let Some(path) = schema {
        options.schema = SourceSchema::from_file(&PathBuf::from(path))?;
    }
    if per_row_keys {
        options.key_mode = KeyMode::PerRow;
    }
    Ok(options)
}

/// SQLite creates the file but not its directory.
pub(crate) fn ensure_db_dir(db: &DbConfig) -> Result<()> {
    if let Some(parent) = db.database_path().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub(crate) fn print_summary(title: &str, summary: &RunSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Table", "Rows"]);
    for (name, rows) in &summary.tables {
        table.add_row(vec![Cell::new(name), Cell::new(count(*rows))]);
    }

    println!("{}", title.bold());
    println!(
        "{} read, {} cleaned, {} dropped (missing required field)",
        count(summary.rows_read),
        count(summary.rows_cleaned),
        count(summary.rows_dropped)
    );
    if summary.unmatched > 0 {
        println!(
            "{}",
            format!("{} rows matched no dimension row", count(summary.unmatched)).yellow()
        );
    }
    println!("Total amount: {}", amount(summary.total_amount));
    println!("{table}");
}

use std::path::PathBuf;

use crate::cleaner::{clean, CleanReport, CleaningPolicy};
use crate::db::{initialize_schema, Warehouse};
use crate::dimensions::{extract_all, Dimensions, KeyMode};
use crate::error::Result;
use crate::fact::{assemble, FactTable, FACT_TABLE};
use crate::loader::load_star;
use crate::models::Dataset;
use crate::settings::DbConfig;
use crate::source::{read_csv, SourceSchema};

pub struct RunOptions {
    pub input: PathBuf,
    pub schema: SourceSchema,
    pub policy: CleaningPolicy,
    pub key_mode: KeyMode,
}

impl RunOptions {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            schema: SourceSchema::nuga_bank_v1(),
            policy: CleaningPolicy::nuga_bank(),
            key_mode: KeyMode::default(),
        }
    }
}

/// Everything produced before the warehouse is touched.
pub struct Transformed {
    pub report: CleanReport,
    pub cleaned: Dataset,
    pub dims: Dimensions,
    pub fact: FactTable,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub rows_read: usize,
    pub rows_cleaned: usize,
    pub rows_dropped: usize,
    pub unmatched: usize,
    /// (table, rows) in load order.
    pub tables: Vec<(String, usize)>,
    pub total_amount: f64,
}

impl Transformed {
    pub fn summary(&self) -> RunSummary {
        let total_amount = self
            .cleaned
            .column_index("Amount")
            .map(|i| self.cleaned.rows.iter().filter_map(|r| r[i].as_f64()).sum())
            .unwrap_or(0.0);
        RunSummary {
            rows_read: self.report.rows_in,
            rows_cleaned: self.cleaned.len(),
            rows_dropped: self.report.rows_dropped,
            unmatched: self.fact.unmatched,
            tables: vec![
                (self.dims.customer.spec.table.to_string(), self.dims.customer.len()),
                (self.dims.transaction.spec.table.to_string(), self.dims.transaction.len()),
                (self.dims.employee.spec.table.to_string(), self.dims.employee.len()),
                (FACT_TABLE.to_string(), self.fact.len()),
            ],
            total_amount,
        }
    }
}

/// Read, clean, extract dimensions and assemble the fact table.
pub fn transform(options: &RunOptions) -> Result<Transformed> {
    let raw = read_csv(&options.input, &options.schema)?;
    let (cleaned, report) = clean(raw, &options.policy)?;
    let dims = extract_all(&cleaned, options.key_mode)?;
    let fact = assemble(&cleaned, &dims)?;
    if cleaned.is_empty() {
        tracing::warn!("no rows left after cleaning; tables will be created empty");
    } else if fact.is_empty() || dims.customer.is_empty() {
        tracing::warn!(unmatched = fact.unmatched, "no fact rows survived the joins");
    }
    Ok(Transformed {
        report,
        cleaned,
        dims,
        fact,
    })
}

/// The whole job: transform, reset the schema, load. The connection is closed
/// on success and dropped on any error.
pub fn run(options: &RunOptions, db: &DbConfig, batch_size: usize) -> Result<RunSummary> {
    let transformed = transform(options)?;

    let mut warehouse = Warehouse::open(db)?;
    initialize_schema(&mut warehouse)?;
    let loaded = load_star(&mut warehouse, &transformed.dims, &transformed.fact, batch_size)?;
    warehouse.close();

    let mut summary = transformed.summary();
    summary.tables = loaded;
    tracing::info!(
        rows = summary.rows_cleaned,
        tables = summary.tables.len(),
        "database tables loaded"
    );
    Ok(summary)
}

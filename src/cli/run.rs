use colored::Colorize;

use crate::cli::{ensure_db_dir, print_summary, run_options};
use crate::error::{EtlError, Result};
use crate::pipeline;
use crate::settings::load_settings;

pub fn run(
    file: &str,
    database: Option<String>,
    batch_size: Option<usize>,
    per_row_keys: bool,
    schema: Option<&str>,
) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(db) = database {
        settings.db.database = db;
    }
    let batch_size = match batch_size {
        Some(0) => return Err(EtlError::Config("--batch-size must be at least 1".to_string())),
        Some(n) => n,
        None => settings.batch_size,
    };

    settings.db.check_local()?;
    ensure_db_dir(&settings.db)?;

    let options = run_options(file, schema, per_row_keys || settings.per_row_keys)?;
    let summary = pipeline::run(&options, &settings.db, batch_size)?;

    print_summary("Load complete", &summary);
    println!(
        "{} {}",
        "Loaded into".green(),
        settings.db.database_path().display()
    );
    Ok(())
}

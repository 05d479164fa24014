use crate::cli::{print_summary, run_options};
use crate::error::Result;
use crate::pipeline::transform;
use crate::settings::load_settings;

pub fn run(file: &str, per_row_keys: bool, schema: Option<&str>) -> Result<()> {
    let settings = load_settings()?;
    let options = run_options(file, schema, per_row_keys || settings.per_row_keys)?;
    let transformed = transform(&options)?;
    print_summary("Dry run (nothing written)", &transformed.summary());
    Ok(())
}

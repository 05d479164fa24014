use crate::cli::ensure_db_dir;
use crate::db::{initialize_schema, schema_version, Warehouse};
use crate::error::Result;
use crate::settings::load_settings;

pub fn run(database: Option<String>) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(db) = database {
        settings.db.database = db;
    }

    settings.db.check_local()?;
    ensure_db_dir(&settings.db)?;

    let mut warehouse = Warehouse::open(&settings.db)?;
    initialize_schema(&mut warehouse)?;
    let version = schema_version(warehouse.conn())?;
    let path = warehouse.path().to_path_buf();
    warehouse.close();

    println!("Tables created (schema v{version}) in {}", path.display());
    Ok(())
}

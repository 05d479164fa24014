mod cleaner;
mod cli;
mod db;
mod dimensions;
mod error;
mod fact;
mod fmt;
mod loader;
mod logging;
mod models;
mod pipeline;
mod settings;
mod source;
#[cfg(test)]
mod testutil;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    // A missing .env is normal; variables may come from the real environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            database,
            batch_size,
            per_row_keys,
            schema,
        } => cli::run::run(&file, database, batch_size, per_row_keys, schema.as_deref()),
        Commands::Inspect {
            file,
            per_row_keys,
            schema,
        } => cli::inspect::run(&file, per_row_keys, schema.as_deref()),
        Commands::SchemaInit { database } => cli::schema_init::run(database),
        Commands::Schema => cli::schema::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if e.is_retryable() {
            eprintln!("The warehouse was unreachable; the run can be retried as is.");
        }
        std::process::exit(e.exit_code());
    }
}

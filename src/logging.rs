use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the stderr subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "nuga_etl=debug" } else { "nuga_etl=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // A second init (e.g. from tests) is not an error worth failing over.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}

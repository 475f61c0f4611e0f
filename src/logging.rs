use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the stderr subscriber once, at startup. Results go to stdout, so
/// logs must not.
///
/// `RUST_LOG` wins unless `verbose` forces debug output.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

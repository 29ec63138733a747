use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber, writing to stderr so response output on
/// stdout stays clean.
///
/// `REQMATE_LOG` takes precedence over `RUST_LOG`; without either the level is
/// `debug` when `verbose` is set and `info` otherwise.
pub fn init_logging(verbose: bool) {
    let filter = std::env::var("REQMATE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| EnvFilter::new(default_level(verbose)),
            |value| {
                EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new(default_level(verbose)))
            },
        );

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {err}");
    }
}

const fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "reqmate=debug"
    } else {
        "info"
    }
}

use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `--quiet` turns logging off outright;
/// otherwise `RUST_LOG` wins when set and the level follows `--verbose`.
pub fn init(verbose: bool, quiet: bool) {
    let fallback = default_directive(verbose, quiet);
    let filter = if quiet {
        EnvFilter::new(fallback)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "off"
    } else if verbose {
        "chatlens=debug,warn"
    } else {
        "warn"
    }
}

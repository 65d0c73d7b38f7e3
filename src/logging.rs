use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, otherwise `default_level`, otherwise `info`.
pub fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the stderr subscriber. Safe to call more than once.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

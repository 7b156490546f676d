//! Logging setup for the command-line binaries.
//!
//! Events go to stderr so they never mix with the status lines printed on
//! stdout. The filter defaults to `warn` and can be overridden with
//! `RUST_LOG`, e.g. `RUST_LOG=iris_roundtrip=debug` to see per-round metrics.

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "warn";

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging() {
    let installed = fmt()
        .with_env_filter(build_env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init_logging();
        init_logging();
    }
}

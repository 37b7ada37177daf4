// 📝 Logging - tracing subscriber shared by the CLI and the server
//
// Output goes to stderr so `registry-index search` can print JSON on stdout.

use std::io;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,registry_index=info";

/// Install the global subscriber: stderr, filtered by `RUST_LOG` when set.
pub fn configure_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_log = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_filter(filter);

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(console_log).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_logging_twice_keeps_first_subscriber() {
        configure_logging();
        configure_logging();
        tracing::info!("still logging");
    }
}

//! Tracing subscriber setup for the `olympus` binary.
//!
//! Logs go to **stderr** so stdout stays clean for answers and `--json`
//! output. The filter comes from `RUST_LOG` when set, otherwise from
//! `[logging].level`; `--verbose` forces `debug` for the olympus crates.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    if verbose {
        for directive in ["olympus=debug", "olympus_core=debug"] {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

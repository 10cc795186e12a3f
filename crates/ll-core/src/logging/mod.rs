//! Structured logging setup.
//!
//! The library itself only emits `tracing` events:
//! - `debug` per inference call, forest discovery, cache decisions, and the
//!   impossible-observation path
//! - `trace` per cache entry and per computed message
//! - `warn` when converged cliques of one tree disagree on its mass
//!
//! Applications that want those events on stderr call [`init_logging`] once.
//!
//! ```ignore
//! use ll_core::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from_env(None, None));
//! ```

pub mod config;

pub use config::{LogConfig, LogFormat, LOG_FORMAT_ENV_VAR, LOG_LEVEL_ENV_VAR};
pub use tracing_subscriber::filter::LevelFilter;

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` directives win over `config.level`. Returns `false` if a global
/// subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ll_core={}", config.level)));

    let installed = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_ansi(use_ansi),
                )
                .try_init()
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_refused() {
        let config = LogConfig {
            level: LevelFilter::OFF,
            ..LogConfig::default()
        };
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}

//! Logging settings: an explicit choice wins, then `LOGLINEAR_LOG` /
//! `LOGLINEAR_LOG_FORMAT`, then the defaults (human lines at `warn`).

use tracing_subscriber::filter::LevelFilter;

/// Environment variable holding the level for this crate's events.
pub const LOG_LEVEL_ENV_VAR: &str = "LOGLINEAR_LOG";

/// Environment variable holding the output format (`human` or `jsonl`).
pub const LOG_FORMAT_ENV_VAR: &str = "LOGLINEAR_LOG_FORMAT";

/// Shape of each event line on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event.
    Jsonl,
}

impl LogFormat {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "human" => Some(LogFormat::Human),
            "jsonl" => Some(LogFormat::Jsonl),
            _ => None,
        }
    }
}

/// What [`super::init_logging`] installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Threshold for `ll_core` events when `RUST_LOG` is unset.
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LevelFilter::WARN,
        }
    }
}

impl LogConfig {
    /// Settings from the process environment; `Some` arguments override it.
    /// Unparsable variables are ignored.
    pub fn from_env(level: Option<LevelFilter>, format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), level, format)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        level: Option<LevelFilter>,
        format: Option<LogFormat>,
    ) -> Self {
        let defaults = LogConfig::default();
        let level = level
            .or_else(|| lookup(LOG_LEVEL_ENV_VAR)?.trim().parse().ok())
            .unwrap_or(defaults.level);
        let format = format
            .or_else(|| LogFormat::from_name(&lookup(LOG_FORMAT_ENV_VAR)?))
            .unwrap_or(defaults.format);
        LogConfig { format, level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn environment_sets_level_and_format() {
        let config = LogConfig::from_lookup(
            env(&[(LOG_LEVEL_ENV_VAR, "Trace"), (LOG_FORMAT_ENV_VAR, "JSONL")]),
            None,
            None,
        );
        assert_eq!(config.level, LevelFilter::TRACE);
        assert_eq!(config.format, LogFormat::Jsonl);
    }

    #[test]
    fn explicit_values_beat_environment() {
        let config = LogConfig::from_lookup(
            env(&[(LOG_LEVEL_ENV_VAR, "trace"), (LOG_FORMAT_ENV_VAR, "jsonl")]),
            Some(LevelFilter::ERROR),
            Some(LogFormat::Human),
        );
        assert_eq!(config.level, LevelFilter::ERROR);
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = LogConfig::from_lookup(
            env(&[(LOG_LEVEL_ENV_VAR, "loud"), (LOG_FORMAT_ENV_VAR, "xml")]),
            None,
            None,
        );
        assert_eq!(config, LogConfig::default());
        assert_eq!(LogConfig::from_lookup(env(&[]), None, None).level, LevelFilter::WARN);
    }
}

//! Diagnostics for the bridge CLI.
//!
//! Status lines and frame events own stdout; every log record goes to stderr.
//! `--log-level` applies to the panelbridge crates only, dependencies stay at
//! `warn`. A directive string in `PANELBRIDGE_LOG` replaces both.

use clap::ValueEnum;
use tracing_subscriber::fmt::time::Uptime;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive string.
pub const LOG_ENV: &str = "PANELBRIDGE_LOG";

/// Crates whose records follow `--log-level`.
const BRIDGE_TARGETS: [&str; 4] = [
    "panelbridge",
    "panelbridge_core",
    "panelbridge_frame",
    "panelbridge_hal",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines with session uptime and thread names.
    Text,
    /// One JSON object per record.
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Rejected frames, offline sound module and restarts.
    Warn,
    /// Playback and device lifecycle.
    Info,
    /// Decoded commands, channel changes and status board updates.
    Debug,
    /// Every sound module packet and command.
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Directive string for `level` on the bridge crates, `warn` elsewhere.
fn bridge_directives(level: LogLevel) -> String {
    let level = level.directive();
    let mut directives = String::from("warn");
    for target in BRIDGE_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// `PANELBRIDGE_LOG` when set and parseable, the `--log-level` directives
/// otherwise.
fn build_filter(level: LogLevel, env: Option<&str>) -> EnvFilter {
    if let Some(directives) = env.filter(|value| !value.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("ignoring {LOG_ENV}: {err}"),
        }
    }
    EnvFilter::new(bridge_directives(level))
}

/// Install the stderr subscriber.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let env = std::env::var(LOG_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, env.as_deref()))
        .with_timer(Uptime::default())
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    // A second install (tests, embedding) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_applies_to_bridge_crates_only() {
        assert_eq!(
            bridge_directives(LogLevel::Debug),
            "warn,panelbridge=debug,panelbridge_core=debug,panelbridge_frame=debug,panelbridge_hal=debug"
        );
    }

    #[test]
    fn env_directives_replace_level() {
        let filter = build_filter(LogLevel::Info, Some("panelbridge_hal=trace"));
        assert_eq!(filter.to_string(), "panelbridge_hal=trace");
    }

    #[test]
    fn blank_or_invalid_env_falls_back_to_level() {
        let expected = EnvFilter::new(bridge_directives(LogLevel::Warn)).to_string();
        assert_eq!(build_filter(LogLevel::Warn, Some("  ")).to_string(), expected);
        assert_eq!(
            build_filter(LogLevel::Warn, Some("panelbridge=loud")).to_string(),
            expected
        );
        assert_eq!(build_filter(LogLevel::Warn, None).to_string(), expected);
    }
}

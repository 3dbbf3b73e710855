//! Logging system configuration and initialization
//!
//! - Console output with local timestamps
//! - Daily rolling log file written through a non-blocking worker
//! - Optional JSON format for the file output
//! - `RUST_LOG` overrides the configured level entirely

use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::{self, time::ChronoLocal};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use crate::infrastructure::config::LoggingConfig;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Dependencies capped at `warn` unless the level is `trace`
const NOISY_TARGETS: &[&str] = &[
    "reqwest=warn",
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "rustls=warn",
    "html5ever=warn",
    "selectors=warn",
    "governor=warn",
];

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    if !config.level.eq_ignore_ascii_case("trace") {
        for directive in NOISY_TARGETS {
            filter = filter.add_directive(directive.parse::<Directive>()?);
        }
    }

    for (target, level) in &config.module_filters {
        let directive = format!("{target}={level}")
            .parse::<Directive>()
            .with_context(|| format!("Invalid module filter {target}={level}"))?;
        filter = filter.add_directive(directive);
    }

    Ok(filter)
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> Result<Option<WorkerGuard>> {
    if !config.console_output && !config.file_output {
        bail!("No logging output configured");
    }

    let env_filter = build_env_filter(config)?;

    let (file_writer, guard) = if config.file_output {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let appender = rolling::daily(log_dir, format!("{}.log", config.file_prefix));
        let (writer, guard) = non_blocking(appender);
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let timer = || ChronoLocal::new(TIME_FORMAT.to_string());

    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_timer(timer()).with_target(false));

    let plain_file_layer = file_writer
        .clone()
        .filter(|_| !config.json_format)
        .map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_timer(timer())
                .with_target(false)
                .with_ansi(false)
        });

    let json_file_layer = file_writer.filter(|_| config.json_format).map(|writer| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_timer(timer())
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(plain_file_layer)
        .with(json_file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    info!("📝 Logging initialized (level: {}, json: {})", config.level, config.json_format);
    if config.file_output {
        info!("📁 Log directory: {}", log_dir.display());
    }
    if config.level.eq_ignore_ascii_case("trace") {
        info!("🔍 TRACE level active, dependency logs are not suppressed");
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noisy_targets_are_valid_directives() {
        for directive in NOISY_TARGETS {
            assert!(directive.parse::<Directive>().is_ok(), "{directive}");
        }
    }

    #[test]
    fn refuses_config_without_outputs() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(init_logging(&config, dir.path()).is_err());
    }

    #[test]
    fn default_config_logs_to_console_and_file() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_output);
        assert!(config.file_output);
    }
}

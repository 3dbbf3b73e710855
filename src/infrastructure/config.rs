//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. Optional TOML/JSON/YAML file (`config/stock_watch.toml` unless given)
//! 3. Environment variables, e.g. `STOCK_WATCH_SCAN__MATCH_THRESHOLD=0.8`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::constants::{cache, matching, scan};
use crate::domain::identity::{sanitize_site_id, site_id_from_url};
use crate::infrastructure::retry_policy::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/stock_watch.toml";
pub const ENV_PREFIX: &str = "STOCK_WATCH";
const APP_DIR_NAME: &str = "tcg-stock-watch";
const DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub scan: ScanConfig,
    pub sources: Vec<SourceConfig>,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
    pub notification: NotificationConfig,
    pub schedule: ScheduleConfig,
    pub filters: FilterConfig,
    /// Extra series name -> set code entries for identity building
    pub series: HashMap<String, String>,
    pub logging: LoggingConfig,
}

/// Location of query inputs and persisted state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub products_file: PathBuf,
    pub urls_file: PathBuf,
    pub synonyms_file: PathBuf,
    pub seen_file: PathBuf,
    pub out_of_stock_file: PathBuf,
    pub product_cache_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            products_file: PathBuf::from("products.txt"),
            urls_file: PathBuf::from("urls.txt"),
            synonyms_file: PathBuf::from("synonyms.json"),
            seen_file: PathBuf::from("seen.txt"),
            out_of_stock_file: PathBuf::from("out_of_stock.txt"),
            product_cache_file: PathBuf::from("product_cache.json"),
        }
    }
}

impl PathsConfig {
    /// Relative paths live below `data_dir`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}

/// Per-user data directory of the application
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Matching and cache behaviour of a scan cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub match_threshold: f64,
    pub strict_threshold: f64,
    pub cooldown_secs: u64,
    pub cache_max_age_secs: u64,
    pub max_parallel_sources: usize,
    /// Suppress notifications for sold-out transitions
    pub only_available: bool,
    /// Reject any known product-type disagreement, not only for displays
    pub strict_type_gate: bool,
    /// Queries configured inline, in addition to the products file
    pub queries: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            match_threshold: matching::DEFAULT_MATCH_THRESHOLD,
            strict_threshold: matching::DEFAULT_STRICT_THRESHOLD,
            cooldown_secs: cache::DEFAULT_COOLDOWN_SECS,
            cache_max_age_secs: cache::DEFAULT_MAX_AGE_SECS,
            max_parallel_sources: scan::DEFAULT_MAX_PARALLEL_SOURCES,
            only_available: false,
            strict_type_gate: false,
            queries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Independent listing page, scanned in the parallel pool
    #[default]
    Generic,
    /// Scanned sequentially with its own registered scraper
    Dedicated,
}

/// One shop page to scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub mode: SourceMode,
}

impl SourceConfig {
    pub fn generic(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            site_id: None,
            mode: SourceMode::Generic,
        }
    }

    /// Configured site id, otherwise derived from the URL host
    pub fn resolved_site_id(&self) -> Option<String> {
        match &self.site_id {
            Some(id) => Some(sanitize_site_id(id)).filter(|id| !id.is_empty()),
            None => site_id_from_url(&self.url),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub verify_tls: bool,
    /// Hosts fetched without certificate verification
    pub insecure_domains: Vec<String>,
    pub user_agent: String,
    pub requests_per_second: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            verify_tls: true,
            insecure_domains: Vec::new(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
            requests_per_second: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// Maximum events per digest message
    pub batch_size: usize,
    /// Consecutive failed cycles before the operator alert
    pub alert_after_failures: u32,
    /// Log messages instead of sending them
    pub dry_run: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            telegram_chat_id: None,
            batch_size: scan::DEFAULT_DIGEST_BATCH_SIZE,
            alert_after_failures: scan::DEFAULT_ALERT_AFTER_FAILURES,
            dry_run: false,
        }
    }
}

/// Date window with its own loop interval; dates are `dd.mm.yyyy`, both inclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindowConfig {
    pub start: String,
    pub end: String,
    pub interval_secs: u64,
}

impl ScheduleWindowConfig {
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
                .map_err(|e| ConfigError::invalid(format!("invalid schedule date '{value}': {e}")))
        };
        let start = parse(&self.start)?;
        let end = parse(&self.end)?;
        if start > end {
            return Err(ConfigError::invalid(format!(
                "schedule window {} - {} ends before it starts",
                self.start, self.end
            )));
        }
        Ok((start, end))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub default_interval_secs: u64,
    pub windows: Vec<ScheduleWindowConfig>,
    pub failure_backoff_base_secs: u64,
    pub failure_backoff_max_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: scan::DEFAULT_INTERVAL_SECS,
            windows: Vec::new(),
            failure_backoff_base_secs: 60,
            failure_backoff_max_secs: 1_800,
        }
    }
}

/// Blacklist terms in addition to the built-in ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub global: Vec<String>,
    pub sites: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `<data_dir>/logs`
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
    /// Per-target levels, e.g. `reqwest = "debug"`
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            log_dir: None,
            file_prefix: "stock-watch".to_string(),
            module_filters: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then the config file, then `STOCK_WATCH_*` variables.
    ///
    /// An explicitly given file must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Self::default())?;
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("scan.match_threshold", self.scan.match_threshold),
            ("scan.strict_threshold", self.scan.strict_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(format!("{name} must be in (0, 1], got {value}")));
            }
        }
        if self.scan.max_parallel_sources == 0 {
            return Err(ConfigError::invalid("scan.max_parallel_sources must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid("retry.backoff_multiplier must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_ratio) {
            return Err(ConfigError::invalid("retry.jitter_ratio must be in [0, 1]"));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::invalid("http.timeout_secs must be at least 1"));
        }
        if self.http.requests_per_second == 0 {
            return Err(ConfigError::invalid("http.requests_per_second must be at least 1"));
        }
        if self.notification.batch_size == 0 {
            return Err(ConfigError::invalid("notification.batch_size must be at least 1"));
        }
        if self.schedule.default_interval_secs == 0 {
            return Err(ConfigError::invalid("schedule.default_interval_secs must be at least 1"));
        }
        for window in &self.schedule.windows {
            window.date_range()?;
            if window.interval_secs == 0 {
                return Err(ConfigError::invalid(format!(
                    "schedule window {} - {} needs a positive interval",
                    window.start, window.end
                )));
            }
        }
        for source in &self.sources {
            if source.resolved_site_id().is_none() {
                return Err(ConfigError::invalid(format!(
                    "source {} has no usable site id",
                    source.url
                )));
            }
        }
        Ok(())
    }

    /// Telegram credentials when both are configured
    pub fn telegram_credentials(&self) -> Option<(&str, &str)> {
        let token = self.notification.telegram_token.as_deref().filter(|t| !t.is_empty())?;
        let chat_id = self.notification.telegram_chat_id.as_deref().filter(|c| !c.is_empty())?;
        Some((token, chat_id))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .log_dir
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join("logs"))
    }
}

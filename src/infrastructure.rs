//! Infrastructure layer: configuration, logging, HTTP fetching, scraping,
//! persistence and notification delivery

pub mod config;
pub mod fetch_error;
pub mod html_scraper;
pub mod http_fetcher;
pub mod logging;
pub mod notifier;
pub mod query_source;
pub mod retry_policy;
pub mod site_scraper;
pub mod state_store;

pub use config::{AppConfig, ConfigError, SourceConfig, SourceMode};
pub use fetch_error::FetchError;
pub use html_scraper::GenericSiteScraper;
pub use http_fetcher::{FetchedPage, HttpFetcher, PageFetcher, RetryingFetcher};
pub use notifier::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
pub use query_source::{QueryInputs, QuerySource};
pub use retry_policy::{RetryPolicy, Sleeper, TokioSleeper};
pub use site_scraper::{AvailabilityReport, ScraperRegistry, SiteScraper};
pub use state_store::{StateStore, StoreError};

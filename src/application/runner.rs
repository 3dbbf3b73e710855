//! Top-level scan loop and maintenance modes
//!
//! Queries, sources and persisted state are reloaded at the start of every
//! cycle and saved at its end. The loop never terminates on errors: failed
//! cycles back off and, after enough consecutive failures, the operator is
//! alerted through the notification channel.

use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::digest::format_operator_alert;
use crate::application::scan_cycle::{CycleReport, ScanCycle, ScanSettings, ScanState, resolve_sources};
use crate::application::schedule::{current_interval, failure_backoff};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_fetcher::PageFetcher;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::query_source::QuerySource;
use crate::infrastructure::site_scraper::ScraperRegistry;
use crate::infrastructure::state_store::StateStore;

/// Result of `clean`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanReport {
    pub pruned_entries: usize,
    pub remaining_entries: usize,
    pub seen_markers: usize,
    pub out_of_stock: usize,
}

pub struct Runner<F, N> {
    config: AppConfig,
    cycle: ScanCycle<F, N>,
    store: StateStore,
    queries: QuerySource,
}

impl<F: PageFetcher, N: Notifier> Runner<F, N> {
    pub fn new(config: AppConfig, fetcher: F, notifier: N, scrapers: ScraperRegistry) -> Self {
        let settings = ScanSettings::from_config(&config);
        Self {
            store: StateStore::from_paths(&config.paths),
            queries: QuerySource::from_config(&config),
            cycle: ScanCycle::new(fetcher, notifier, scrapers, settings),
            config,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// One full cycle: load inputs and state, scan, persist
    pub async fn run_once(&self) -> Result<CycleReport> {
        let inputs = self.queries.load().await;
        let sources = resolve_sources(&self.config.sources, &inputs.extra_sources);
        let mut state = ScanState {
            ledger: self.store.load_ledger().await,
            cache: self.store.load_cache().await,
        };

        let report = self.cycle.run(&inputs.queries, &sources, &mut state).await;

        self.store
            .save_ledger(&state.ledger)
            .await
            .context("Failed to save notification state")?;
        self.store
            .save_cache(&state.cache)
            .await
            .context("Failed to save product cache")?;
        Ok(report)
    }

    /// Scan until `shutdown` is cancelled. A running cycle always finishes
    /// and persists before the loop stops.
    pub async fn run_forever(&self, shutdown: CancellationToken) -> Result<()> {
        let alert_after = self.config.notification.alert_after_failures.max(1);
        let mut consecutive_failures: u32 = 0;

        info!("🔁 Scan loop started");
        while !shutdown.is_cancelled() {
            let failure = match self.run_once().await {
                Ok(report) if report.is_failure() => Some(
                    report
                        .last_error()
                        .unwrap_or("all sources failed")
                        .to_string(),
                ),
                Ok(_) => None,
                Err(e) => Some(format!("{e:#}")),
            };

            let pause = match failure {
                None => {
                    if consecutive_failures > 0 {
                        info!("✅ Recovered after {} failed cycles", consecutive_failures);
                    }
                    consecutive_failures = 0;
                    current_interval(&self.config.schedule)
                }
                Some(last_error) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    error!("❌ Scan cycle failed ({} in a row): {}", consecutive_failures, last_error);
                    if consecutive_failures % alert_after == 0 {
                        self.alert_operator(consecutive_failures, &last_error).await;
                    }
                    failure_backoff(&self.config.schedule, consecutive_failures)
                }
            };

            info!("⏳ Next cycle in {}s", pause.as_secs());
            if !wait_or_shutdown(&shutdown, pause).await {
                break;
            }
        }
        info!("🛑 Scan loop stopped");
        Ok(())
    }

    async fn alert_operator(&self, consecutive_failures: u32, last_error: &str) {
        let message = format_operator_alert(consecutive_failures, last_error);
        match self.cycle.notifier().notify(&message).await {
            Ok(()) => warn!("🚨 Operator alerted after {} failed cycles", consecutive_failures),
            Err(e) => error!("❌ Operator alert could not be delivered: {}", e),
        }
    }

    /// Delete all persisted state
    pub async fn reset(&self) -> Result<usize> {
        let removed = self.store.reset().await.context("Failed to reset state")?;
        info!("🗑️ Reset removed {} state files", removed);
        Ok(removed)
    }

    /// Prune expired cache entries and rewrite the state files normalized
    pub async fn clean(&self) -> Result<CleanReport> {
        self.clean_at(Utc::now().timestamp()).await
    }

    pub async fn clean_at(&self, now: i64) -> Result<CleanReport> {
        let ledger = self.store.load_ledger().await;
        let mut cache = self.store.load_cache().await;
        let pruned_entries = cache.prune_expired(self.config.scan.cache_max_age_secs, now);

        self.store
            .save_ledger(&ledger)
            .await
            .context("Failed to rewrite notification state")?;
        self.store
            .save_cache(&cache)
            .await
            .context("Failed to rewrite product cache")?;

        let report = CleanReport {
            pruned_entries,
            remaining_entries: cache.len(),
            seen_markers: ledger.seen.len(),
            out_of_stock: ledger.out_of_stock.len(),
        };
        info!(
            "🧹 Clean finished: {} expired entries pruned, {} kept",
            report.pruned_entries, report.remaining_entries
        );
        Ok(report)
    }
}

/// Sleep for `pause`; false when shutdown was requested first
async fn wait_or_shutdown(shutdown: &CancellationToken, pause: Duration) -> bool {
    tokio::select! {
        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(pause) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_false_on_shutdown() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!wait_or_shutdown(&token, Duration::from_secs(3_600)).await);
        assert!(wait_or_shutdown(&CancellationToken::new(), Duration::ZERO).await);
    }
}

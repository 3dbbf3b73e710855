//! One scan cycle over all sources
//!
//! Sources are fetched and matched by workers that only read a snapshot of
//! their site's product cache. Workers return their findings and cache
//! changes; a single reducer then runs the availability state machine,
//! sends digests and applies the cache changes in source order.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::application::digest::{NotificationEvent, format_digest, into_batches};
use crate::domain::availability::StockLedger;
use crate::domain::candidate::{Candidate, ProductData, ScrapeOutcome};
use crate::domain::constants::scan;
use crate::domain::filters::CandidateFilter;
use crate::domain::identity::{SeriesTable, build_identity};
use crate::domain::keywords::ProductQuery;
use crate::domain::matcher::{MatchSettings, best_query, evaluate, strict_matches};
use crate::domain::product_cache::{
    CacheChange, ProductCache, ProductCacheEntry, SiteCache, content_changed, fingerprint, path_id,
    should_recrawl_at,
};
use crate::infrastructure::config::{AppConfig, SourceConfig, SourceMode};
use crate::infrastructure::http_fetcher::PageFetcher;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::site_scraper::{ScraperRegistry, SiteScraper};

/// Knobs of a scan cycle, taken from `[scan]`, `[notification]`, `[filters]` and `[series]`
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub matching: MatchSettings,
    pub cooldown_secs: u64,
    pub cache_max_age_secs: u64,
    pub max_parallel_sources: usize,
    pub only_available: bool,
    pub batch_size: usize,
    /// Digest length limit in UTF-16 code units
    pub max_message_units: usize,
    pub filter: CandidateFilter,
    pub series: SeriesTable,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ScanSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            matching: MatchSettings {
                threshold: config.scan.match_threshold,
                strict_threshold: config.scan.strict_threshold,
                strict_type_gate: config.scan.strict_type_gate,
            },
            cooldown_secs: config.scan.cooldown_secs,
            cache_max_age_secs: config.scan.cache_max_age_secs,
            max_parallel_sources: config.scan.max_parallel_sources,
            only_available: config.scan.only_available,
            batch_size: config.notification.batch_size,
            max_message_units: scan::MAX_MESSAGE_UTF16_UNITS,
            filter: CandidateFilter::with_terms(&config.filters.global, &config.filters.sites),
            series: SeriesTable::with_extra(&config.series),
        }
    }
}

/// Persisted state threaded through a cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanState {
    pub ledger: StockLedger,
    pub cache: ProductCache,
}

/// A source with a resolved site id and its position in the cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSource {
    pub index: usize,
    pub url: String,
    pub site_id: String,
    pub mode: SourceMode,
}

/// Configured sources followed by the extra ones, deduplicated by URL.
/// Sources without a derivable site id are skipped.
pub fn resolve_sources(configured: &[SourceConfig], extra: &[SourceConfig]) -> Vec<ScanSource> {
    let mut urls = HashSet::new();
    let mut sources = Vec::new();
    for source in configured.iter().chain(extra) {
        let url = source.url.trim();
        if url.is_empty() || !urls.insert(url.to_string()) {
            continue;
        }
        let Some(site_id) = source.resolved_site_id() else {
            warn!("⚠️ Skipping source without a site id: {}", url);
            continue;
        };
        sources.push(ScanSource {
            index: sources.len(),
            url: url.to_string(),
            site_id,
            mode: source.mode,
        });
    }
    sources
}

/// What one worker brings back for the reducer
#[derive(Debug, Default)]
struct SourceReport {
    index: usize,
    site_id: String,
    found: Vec<ProductData>,
    changes: Vec<CacheChange>,
    candidates: usize,
    from_cache: usize,
    evicted: usize,
    error: Option<String>,
}

/// Counts and outcomes of a finished cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub sources_total: usize,
    pub sources_failed: usize,
    pub candidates: usize,
    pub matched: usize,
    pub from_cache: usize,
    pub cache_evictions: usize,
    pub cache_pruned: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// One entry per matched identity after the state machine ran
    pub outcomes: Vec<ScrapeOutcome>,
    /// `(source url, error)` per failed source
    pub source_errors: Vec<(String, String)>,
}

impl CycleReport {
    /// Every source failed; counts towards the operator alert
    pub fn is_failure(&self) -> bool {
        self.sources_total > 0 && self.sources_failed == self.sources_total
    }

    pub fn last_error(&self) -> Option<&str> {
        self.source_errors.last().map(|(_, error)| error.as_str())
    }

    pub fn notified(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ScrapeOutcome::Processed { notified: true }))
            .count()
    }
}

pub struct ScanCycle<F, N> {
    fetcher: F,
    notifier: N,
    scrapers: ScraperRegistry,
    settings: ScanSettings,
}

impl<F: PageFetcher, N: Notifier> ScanCycle<F, N> {
    pub fn new(fetcher: F, notifier: N, scrapers: ScraperRegistry, settings: ScanSettings) -> Self {
        Self {
            fetcher,
            notifier,
            scrapers,
            settings,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub async fn run(&self, queries: &[ProductQuery], sources: &[ScanSource], state: &mut ScanState) -> CycleReport {
        self.run_at(queries, sources, state, Utc::now().timestamp()).await
    }

    /// Run one cycle as of `now` (epoch seconds)
    pub async fn run_at(
        &self,
        queries: &[ProductQuery],
        sources: &[ScanSource],
        state: &mut ScanState,
        now: i64,
    ) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", id = %cycle_id);
        self.run_inner(cycle_id, queries, sources, state, now)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        cycle_id: Uuid,
        queries: &[ProductQuery],
        sources: &[ScanSource],
        state: &mut ScanState,
        now: i64,
    ) -> CycleReport {
        let mut report = CycleReport {
            cycle_id,
            sources_total: sources.len(),
            ..CycleReport::default()
        };

        report.cache_pruned = state.cache.prune_expired(self.settings.cache_max_age_secs, now);
        if report.cache_pruned > 0 {
            debug!("🧹 Pruned {} expired cache entries", report.cache_pruned);
        }
        if queries.is_empty() {
            warn!("⚠️ No product queries configured, nothing to scan");
            report.sources_total = 0;
            return report;
        }
        info!("🚀 Scan cycle started: {} sources, {} queries", sources.len(), queries.len());

        let source_reports = self.scan_sources(queries, sources, &state.cache, now).await;

        let mut found = Vec::new();
        for source_report in source_reports {
            report.candidates += source_report.candidates;
            report.from_cache += source_report.from_cache;
            report.cache_evictions += source_report.evicted;
            if let Some(error) = source_report.error {
                report.sources_failed += 1;
                let url = sources
                    .iter()
                    .find(|source| source.index == source_report.index)
                    .map(|source| source.url.clone())
                    .unwrap_or_default();
                report.source_errors.push((url, error));
            }
            for change in source_report.changes {
                state.cache.apply(&source_report.site_id, change);
            }
            found.extend(source_report.found);
        }

        self.reduce(found, &mut state.ledger, &mut report).await;

        info!(
            "✅ Scan cycle finished: {} matched, {} notified, {} failed sources",
            report.matched,
            report.notified(),
            report.sources_failed
        );
        report
    }

    /// Dedicated sources one after another, generic ones on a bounded pool.
    /// Reports come back in source order.
    async fn scan_sources(
        &self,
        queries: &[ProductQuery],
        sources: &[ScanSource],
        cache: &ProductCache,
        now: i64,
    ) -> Vec<SourceReport> {
        let (dedicated, generic): (Vec<&ScanSource>, Vec<&ScanSource>) = sources
            .iter()
            .partition(|source| source.mode == SourceMode::Dedicated);

        let mut reports = Vec::with_capacity(sources.len());
        for source in dedicated {
            let scraper = self.scrapers.for_site(&source.site_id);
            let snapshot = cache.site_snapshot(&source.site_id);
            reports.push(self.scan_source(source, scraper, queries, snapshot, now).await);
        }

        let workers = generic.len().min(self.settings.max_parallel_sources).max(1);
        let mut generic_reports: Vec<SourceReport> = stream::iter(generic)
            .map(|source| {
                let snapshot = cache.site_snapshot(&source.site_id);
                self.scan_source(source, self.scrapers.fallback(), queries, snapshot, now)
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        reports.append(&mut generic_reports);

        reports.sort_by_key(|report| report.index);
        reports
    }

    async fn scan_source(
        &self,
        source: &ScanSource,
        scraper: Arc<dyn SiteScraper>,
        queries: &[ProductQuery],
        mut site_cache: SiteCache,
        now: i64,
    ) -> SourceReport {
        let mut report = SourceReport {
            index: source.index,
            site_id: source.site_id.clone(),
            ..SourceReport::default()
        };

        let page = match self.fetcher.fetch(&source.url).await {
            Ok(page) => page,
            Err(e) => {
                warn!("⚠️ Source {} skipped this cycle: {}", source.url, e);
                report.error = Some(e.to_string());
                return report;
            }
        };

        let candidates = scraper.find_candidates(&page, &source.site_id);
        report.candidates = candidates.len();
        debug!("🔍 {}: {} candidates", source.site_id, candidates.len());

        for candidate in &candidates {
            let outcome = self
                .evaluate_candidate(candidate, scraper.as_ref(), queries, &mut site_cache, &mut report, now)
                .await;
            if let ScrapeOutcome::Found(product) = outcome {
                report.found.push(product);
            }
        }
        info!(
            "📦 {}: {} of {} candidates matched",
            source.site_id,
            report.found.len(),
            report.candidates
        );
        report
    }

    async fn evaluate_candidate(
        &self,
        candidate: &Candidate,
        scraper: &dyn SiteScraper,
        queries: &[ProductQuery],
        site_cache: &mut SiteCache,
        report: &mut SourceReport,
        now: i64,
    ) -> ScrapeOutcome {
        if let Some(term) = self.settings.filter.blocked_by(candidate) {
            debug!("🚫 Filtered '{}' (term: '{}')", candidate.text, term);
            return ScrapeOutcome::NoMatch;
        }
        let Some(best) = best_query(queries, &candidate.text, &self.settings.matching) else {
            return ScrapeOutcome::NoMatch;
        };
        let query = best.query;
        let identity = build_identity(&candidate.site_id, &candidate.text, &self.settings.series);
        let key = path_id(&candidate.url);
        let cached = site_cache.get(&key).cloned();

        let product = |entry: &ProductCacheEntry, status_text: String, from_cache: bool| ProductData {
            identity: identity.clone(),
            site_id: candidate.site_id.clone(),
            title: entry.title.clone().unwrap_or_else(|| candidate.text.clone()),
            url: candidate.url.clone(),
            query: query.raw().to_string(),
            product_type: best.candidate_type,
            is_available: entry.is_available,
            price: entry.price.clone(),
            status_text,
            from_cache,
        };

        if let Some(entry) = cached.as_ref().filter(|entry| !should_recrawl_at(entry, self.settings.cooldown_secs, now)) {
            debug!("♻️ Cooldown active for {}, reusing cached availability", candidate.url);
            report.from_cache += 1;
            return ScrapeOutcome::Found(product(entry, cached_status(entry), true));
        }

        let page = match self.fetcher.fetch(&candidate.url).await {
            Ok(page) => page,
            Err(e) if e.is_permanent() => {
                if site_cache.remove(&key).is_some() {
                    info!("🗑️ Evicting {} from the product cache: {}", candidate.url, e);
                    report.changes.push(CacheChange::Evict { path_id: key });
                    report.evicted += 1;
                }
                return ScrapeOutcome::NoMatch;
            }
            Err(e) => {
                warn!("⚠️ Detail page {} failed: {}", candidate.url, e);
                return ScrapeOutcome::NoMatch;
            }
        };

        let page_fingerprint = fingerprint(&page.body);
        if let Some(mut entry) = cached.clone().filter(|entry| !content_changed(entry, &page_fingerprint)) {
            debug!("♻️ Unchanged content at {}", candidate.url);
            entry.last_checked = now;
            report.from_cache += 1;
            let found = product(&entry, cached_status(&entry), true);
            site_cache.insert(key.clone(), entry.clone());
            report.changes.push(CacheChange::Upsert { path_id: key, entry });
            return ScrapeOutcome::Found(found);
        }

        let title = scraper
            .extract_title(&page)
            .unwrap_or_else(|| candidate.text.clone());
        if cached.is_some() && !still_matches(query, &title, &self.settings.matching) {
            info!("🗑️ {} no longer matches '{}', evicting", candidate.url, query.raw());
            site_cache.remove(&key);
            report.changes.push(CacheChange::Evict { path_id: key });
            report.evicted += 1;
            return ScrapeOutcome::NoMatch;
        }

        let availability = scraper.extract_availability(&page);
        let entry = ProductCacheEntry {
            url: candidate.url.clone(),
            term: query.raw().to_string(),
            is_available: availability.is_available,
            price: availability.price,
            last_checked: now,
            fingerprint: Some(page_fingerprint),
            product_type: best.candidate_type,
            title: Some(title),
        };
        let found = product(&entry, availability.status_text, false);
        site_cache.insert(key.clone(), entry.clone());
        report.changes.push(CacheChange::Upsert { path_id: key, entry });
        ScrapeOutcome::Found(found)
    }

    /// Run the state machine over all findings and deliver digests.
    ///
    /// Transitions that need a notification are committed to `ledger`
    /// only after their digest was delivered.
    async fn reduce(&self, found: Vec<ProductData>, ledger: &mut StockLedger, report: &mut CycleReport) {
        let mut staged = ledger.clone();
        let mut identities = HashSet::new();
        let mut events = Vec::new();

        for product in found {
            if !identities.insert(product.identity.clone()) {
                debug!("🔁 Duplicate identity {} dropped", product.identity);
                continue;
            }
            report.matched += 1;

            let update = staged.observe(&product.identity, product.is_available);
            if !update.should_notify {
                ledger.observe(&product.identity, product.is_available);
                report.outcomes.push(ScrapeOutcome::Processed { notified: false });
                continue;
            }
            if self.settings.only_available && !product.is_available {
                debug!("🔕 {} sold out, not notifying", product.identity);
                ledger.observe(&product.identity, product.is_available);
                report.outcomes.push(ScrapeOutcome::Processed { notified: false });
                continue;
            }
            events.push(NotificationEvent::new(product, update.is_back_in_stock));
        }

        for batch in into_batches(events, self.settings.batch_size, self.settings.max_message_units) {
            let message = format_digest(&batch);
            match self.notifier.notify(&message).await {
                Ok(()) => {
                    report.notifications_sent += 1;
                    for event in &batch {
                        ledger.observe(&event.product.identity, event.product.is_available);
                        report.outcomes.push(ScrapeOutcome::Processed { notified: true });
                    }
                    info!("📨 Digest with {} updates delivered", batch.len());
                }
                Err(e) => {
                    report.notifications_failed += 1;
                    report
                        .outcomes
                        .extend(batch.iter().map(|_| ScrapeOutcome::Processed { notified: false }));
                    warn!(
                        "⚠️ Digest with {} updates not delivered, retrying next cycle: {}",
                        batch.len(),
                        e
                    );
                }
            }
        }
    }
}

/// Re-check of a changed detail page: a whole-word match confirms it, and
/// otherwise the listing-level verdict the product was accepted with decides
fn still_matches(query: &ProductQuery, title: &str, settings: &MatchSettings) -> bool {
    strict_matches(query.tokens(), title, settings.strict_threshold) || evaluate(query, title, settings).is_match()
}

fn cached_status(entry: &ProductCacheEntry) -> String {
    if entry.is_available {
        "✅ Available (cached)".to_string()
    } else {
        "❌ Sold out (cached)".to_string()
    }
}

//! Per-site scraping capability
//!
//! A scraper turns fetched pages into candidates and availability reports.
//! The registry hands out the scraper registered for a site id and falls
//! back to the generic HTML scraper otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::candidate::Candidate;
use crate::infrastructure::html_scraper::GenericSiteScraper;
use crate::infrastructure::http_fetcher::FetchedPage;

/// Availability observed on a product detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityReport {
    pub is_available: bool,
    pub price: Option<String>,
    /// Human-readable reason, e.g. "❌ Sold out (pattern: 'ausverkauft')"
    pub status_text: String,
}

pub trait SiteScraper: Send + Sync {
    /// Product links on a listing page
    fn find_candidates(&self, page: &FetchedPage, site_id: &str) -> Vec<Candidate>;

    fn extract_availability(&self, page: &FetchedPage) -> AvailabilityReport;

    fn extract_title(&self, page: &FetchedPage) -> Option<String>;
}

/// Scrapers keyed by site id
#[derive(Clone)]
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn SiteScraper>>,
    fallback: Arc<dyn SiteScraper>,
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::new(Arc::new(GenericSiteScraper::default()))
    }
}

impl ScraperRegistry {
    pub fn new(fallback: Arc<dyn SiteScraper>) -> Self {
        Self {
            scrapers: HashMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, site_id: impl Into<String>, scraper: Arc<dyn SiteScraper>) {
        self.scrapers.insert(site_id.into(), scraper);
    }

    /// Scraper used for generic sources
    pub fn fallback(&self) -> Arc<dyn SiteScraper> {
        Arc::clone(&self.fallback)
    }

    pub fn for_site(&self, site_id: &str) -> Arc<dyn SiteScraper> {
        self.scrapers
            .get(site_id)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScraper;

    impl SiteScraper for FixedScraper {
        fn find_candidates(&self, page: &FetchedPage, site_id: &str) -> Vec<Candidate> {
            vec![Candidate::new("fixed", page.url.clone(), site_id)]
        }

        fn extract_availability(&self, _page: &FetchedPage) -> AvailabilityReport {
            AvailabilityReport {
                is_available: true,
                price: None,
                status_text: "✅ Available".into(),
            }
        }

        fn extract_title(&self, _page: &FetchedPage) -> Option<String> {
            Some("fixed".into())
        }
    }

    #[test]
    fn dispatches_by_site_id() {
        let mut registry = ScraperRegistry::default();
        registry.register("tcgviert", Arc::new(FixedScraper));

        let page = FetchedPage {
            url: "https://tcgviert.com".into(),
            status: 200,
            body: "<html><a href='/p/1'>Other</a></html>".into(),
        };
        assert_eq!(registry.for_site("tcgviert").find_candidates(&page, "tcgviert")[0].text, "fixed");
        assert_eq!(registry.for_site("othershop").find_candidates(&page, "othershop")[0].text, "Other");
    }
}

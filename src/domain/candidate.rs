//! Candidates found on listing pages and the outcome of evaluating them

use serde::{Deserialize, Serialize};

use crate::domain::identity::ProductIdentity;
use crate::domain::product_type::ProductType;

/// A link title observed on a source page, evaluated within one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub url: String,
    pub site_id: String,
}

impl Candidate {
    pub fn new(text: impl Into<String>, url: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            site_id: site_id.into(),
        }
    }
}

/// A matched product with its observed availability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductData {
    pub identity: ProductIdentity,
    pub site_id: String,
    pub title: String,
    pub url: String,
    /// Query line that matched
    pub query: String,
    pub product_type: ProductType,
    pub is_available: bool,
    pub price: Option<String>,
    /// Reason-bearing availability text from the scraper
    pub status_text: String,
    /// Availability was taken from the cache without refetching
    #[serde(default)]
    pub from_cache: bool,
}

/// Result of handling one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    /// Filtered out or below the match threshold
    NoMatch,
    /// Matched and run through the state machine
    Processed { notified: bool },
    /// Matched, state transition still pending
    Found(ProductData),
}

impl ScrapeOutcome {
    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

//! Per-site cache of crawled product detail pages
//!
//! Layout mirrors the persisted JSON:
//! `{ site_id: { path_id: ProductCacheEntry } }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::constants::cache::PATH_ID_HEX_LEN;
use crate::domain::product_type::ProductType;

fn unknown_type() -> ProductType {
    ProductType::Unknown
}

/// What is known about one product URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCacheEntry {
    pub url: String,
    /// Query line that matched this product
    pub term: String,
    pub is_available: bool,
    #[serde(default)]
    pub price: Option<String>,
    /// Epoch seconds of the last detail fetch
    pub last_checked: i64,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default = "unknown_type")]
    pub product_type: ProductType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Entries of one site keyed by path id
pub type SiteCache = BTreeMap<String, ProductCacheEntry>;

/// A mutation produced by a scan worker, applied later by the single cache writer
#[derive(Debug, Clone, PartialEq)]
pub enum CacheChange {
    Upsert { path_id: String, entry: ProductCacheEntry },
    Evict { path_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCache {
    sites: BTreeMap<String, SiteCache>,
}

impl ProductCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, site_id: &str, path_id: &str) -> Option<&ProductCacheEntry> {
        self.sites.get(site_id)?.get(path_id)
    }

    pub fn site(&self, site_id: &str) -> Option<&SiteCache> {
        self.sites.get(site_id)
    }

    /// Owned copy of one site's entries, handed to a worker
    pub fn site_snapshot(&self, site_id: &str) -> SiteCache {
        self.sites.get(site_id).cloned().unwrap_or_default()
    }

    pub fn upsert(&mut self, site_id: &str, path_id: impl Into<String>, entry: ProductCacheEntry) {
        self.sites
            .entry(site_id.to_string())
            .or_default()
            .insert(path_id.into(), entry);
    }

    pub fn evict(&mut self, site_id: &str, path_id: &str) -> Option<ProductCacheEntry> {
        let site = self.sites.get_mut(site_id)?;
        let removed = site.remove(path_id);
        if site.is_empty() {
            self.sites.remove(site_id);
        }
        removed
    }

    pub fn apply(&mut self, site_id: &str, change: CacheChange) {
        match change {
            CacheChange::Upsert { path_id, entry } => self.upsert(site_id, path_id, entry),
            CacheChange::Evict { path_id } => {
                self.evict(site_id, &path_id);
            }
        }
    }

    /// Drop entries not checked for `max_age_secs`; returns how many were removed.
    pub fn prune_expired(&mut self, max_age_secs: u64, now: i64) -> usize {
        let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
        let mut removed = 0;
        for entries in self.sites.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| now.saturating_sub(entry.last_checked) <= max_age);
            removed += before - entries.len();
        }
        self.sites.retain(|_, entries| !entries.is_empty());
        removed
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Total number of entries over all sites
    pub fn len(&self) -> usize {
        self.sites.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// True iff at least `cooldown_secs` passed since the entry was checked.
pub fn should_recrawl(entry: &ProductCacheEntry, cooldown_secs: u64) -> bool {
    should_recrawl_at(entry, cooldown_secs, chrono::Utc::now().timestamp())
}

pub fn should_recrawl_at(entry: &ProductCacheEntry, cooldown_secs: u64, now: i64) -> bool {
    let cooldown = i64::try_from(cooldown_secs).unwrap_or(i64::MAX);
    now.saturating_sub(entry.last_checked) >= cooldown
}

/// True iff the stored fingerprint is missing or differs.
pub fn content_changed(entry: &ProductCacheEntry, new_fingerprint: &str) -> bool {
    entry.fingerprint.as_deref() != Some(new_fingerprint)
}

/// Content hash of a fetched page body
pub fn fingerprint(body: &str) -> String {
    blake3::hash(body.as_bytes()).to_hex().to_string()
}

/// Synthetic cache key of a product URL
pub fn path_id(url: &str) -> String {
    let mut hex = blake3::hash(url.trim().as_bytes()).to_hex().to_string();
    hex.truncate(PATH_ID_HEX_LEN);
    hex
}

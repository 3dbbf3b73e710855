//! Persistence of the notification state and the product cache
//!
//! `seen.txt` and `out_of_stock.txt` are newline-delimited and written
//! sorted, `product_cache.json` is pretty-printed JSON. Writes go to a
//! sibling temp file which is then renamed over the target. Missing,
//! unreadable or corrupt files load as empty state.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::domain::availability::{OutOfStockSet, SeenSet, StockLedger};
use crate::domain::product_cache::ProductCache;
use crate::infrastructure::config::PathsConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize product cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateStore {
    seen_path: PathBuf,
    out_of_stock_path: PathBuf,
    cache_path: PathBuf,
}

impl StateStore {
    pub fn new(seen_path: PathBuf, out_of_stock_path: PathBuf, cache_path: PathBuf) -> Self {
        Self {
            seen_path,
            out_of_stock_path,
            cache_path,
        }
    }

    pub fn from_paths(paths: &PathsConfig) -> Self {
        Self::new(
            paths.resolve(&paths.seen_file),
            paths.resolve(&paths.out_of_stock_file),
            paths.resolve(&paths.product_cache_file),
        )
    }

    /// Seen and out-of-stock sets; never fails
    pub async fn load_ledger(&self) -> StockLedger {
        let seen = SeenSet::from_lines(read_lines(&self.seen_path).await);
        let out_of_stock = OutOfStockSet::from_lines(read_lines(&self.out_of_stock_path).await);
        debug!(
            "📂 Loaded {} seen markers, {} out-of-stock identities",
            seen.len(),
            out_of_stock.len()
        );
        StockLedger::new(seen, out_of_stock)
    }

    pub async fn save_ledger(&self, ledger: &StockLedger) -> Result<(), StoreError> {
        write_lines(&self.seen_path, &ledger.seen.to_lines()).await?;
        write_lines(&self.out_of_stock_path, &ledger.out_of_stock.to_lines()).await?;
        Ok(())
    }

    /// Product cache; a corrupt file is moved aside and an empty cache returned
    pub async fn load_cache(&self) -> ProductCache {
        let contents = match fs::read_to_string(&self.cache_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return ProductCache::new(),
            Err(e) => {
                warn!("⚠️ Cannot read {}: {}, starting with an empty cache", self.cache_path.display(), e);
                return ProductCache::new();
            }
        };
        if contents.trim().is_empty() {
            return ProductCache::new();
        }

        match serde_json::from_str::<ProductCache>(&contents) {
            Ok(cache) => {
                debug!("📂 Loaded product cache with {} entries", cache.len());
                cache
            }
            Err(e) => {
                let backup = with_suffix(&self.cache_path, "corrupt");
                warn!(
                    "⚠️ Corrupt product cache {}: {}, moving it to {}",
                    self.cache_path.display(),
                    e,
                    backup.display()
                );
                if let Err(rename_error) = fs::rename(&self.cache_path, &backup).await {
                    warn!("⚠️ Could not move corrupt cache aside: {}", rename_error);
                }
                ProductCache::new()
            }
        }
    }

    pub async fn save_cache(&self, cache: &ProductCache) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(cache)?;
        write_atomic(&self.cache_path, json.as_bytes()).await
    }

    /// Delete all state files; returns how many existed
    pub async fn reset(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for path in [&self.seen_path, &self.out_of_stock_path, &self.cache_path] {
            match fs::remove_file(path).await {
                Ok(()) => {
                    info!("🗑️ Removed {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        Ok(removed)
    }
}

async fn read_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path).await {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!("⚠️ Cannot read {}: {}, starting empty", path.display(), e);
            Vec::new()
        }
    }
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<(), StoreError> {
    let mut contents = lines.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    write_atomic(path, contents.as_bytes()).await
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let tmp = with_suffix(path, "tmp");
    fs::write(&tmp, contents).await.map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).await.map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::ProductIdentity;
    use crate::domain::product_cache::ProductCacheEntry;
    use crate::domain::product_type::ProductType;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> StateStore {
        StateStore::new(
            dir.path().join("seen.txt"),
            dir.path().join("out_of_stock.txt"),
            dir.path().join("nested/product_cache.json"),
        )
    }

    #[tokio::test]
    async fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert_eq!(store.load_ledger().await, StockLedger::default());
        assert!(store.load_cache().await.is_empty());
    }

    #[tokio::test]
    async fn ledger_round_trips_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut ledger = StockLedger::default();
        ledger.observe(&ProductIdentity::from_raw("b_sv09_display_EN"), false);
        ledger.observe(&ProductIdentity::from_raw("a_sv09_display_EN"), true);

        store.save_ledger(&ledger).await.unwrap();
        let seen = std::fs::read_to_string(dir.path().join("seen.txt")).unwrap();
        assert_eq!(
            seen,
            "a_sv09_display_EN_status_available\nb_sv09_display_EN_status_unavailable\n"
        );
        assert_eq!(store.load_ledger().await, ledger);
    }

    #[tokio::test]
    async fn cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut cache = ProductCache::new();
        cache.upsert(
            "tcgviert",
            "0123456789abcdef",
            ProductCacheEntry {
                url: "https://tcgviert.com/products/x".into(),
                term: "Journey Together display".into(),
                is_available: false,
                price: None,
                last_checked: 1_750_000_000,
                fingerprint: Some("abc".into()),
                product_type: ProductType::Display,
                title: Some("Journey Together Display".into()),
            },
        );

        store.save_cache(&cache).await.unwrap();
        assert_eq!(store.load_cache().await, cache);
        assert!(!dir.path().join("nested/product_cache.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_cache_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/product_cache.json"), "{ not json").unwrap();

        assert!(store.load_cache().await.is_empty());
        assert!(dir.path().join("nested/product_cache.json.corrupt").exists());
    }

    #[tokio::test]
    async fn reset_removes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut ledger = StockLedger::default();
        ledger.observe(&ProductIdentity::from_raw("a"), false);
        store.save_ledger(&ledger).await.unwrap();

        assert_eq!(store.reset().await.unwrap(), 2);
        assert_eq!(store.reset().await.unwrap(), 0);
        assert!(store.load_ledger().await.seen.is_empty());
    }
}

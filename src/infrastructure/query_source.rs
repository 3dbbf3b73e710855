//! Query inputs reloaded at the start of every scan cycle
//!
//! - `products.txt`: one query line per product of interest
//! - `urls.txt`: one extra generic source URL per line
//! - `synonyms.json`: `{ "word": ["synonym", ...] }`
//!
//! Blank lines and lines starting with `#` are ignored. Missing files
//! yield empty inputs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::keywords::{ProductQuery, SynonymTable};
use crate::infrastructure::config::{AppConfig, SourceConfig};

/// Everything a scan cycle needs to know about what to look for
#[derive(Debug, Clone, Default)]
pub struct QueryInputs {
    pub queries: Vec<ProductQuery>,
    pub synonyms: SynonymTable,
    pub extra_sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone)]
pub struct QuerySource {
    products_path: PathBuf,
    urls_path: PathBuf,
    synonyms_path: PathBuf,
    inline_queries: Vec<String>,
}

impl QuerySource {
    pub fn new(products_path: PathBuf, urls_path: PathBuf, synonyms_path: PathBuf) -> Self {
        Self {
            products_path,
            urls_path,
            synonyms_path,
            inline_queries: Vec::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let paths = &config.paths;
        Self {
            products_path: paths.resolve(&paths.products_file),
            urls_path: paths.resolve(&paths.urls_file),
            synonyms_path: paths.resolve(&paths.synonyms_file),
            inline_queries: config.scan.queries.clone(),
        }
    }

    pub async fn load(&self) -> QueryInputs {
        let synonyms = load_synonyms(&self.synonyms_path).await;
        let mut lines = self.inline_queries.clone();
        lines.extend(read_entries(&self.products_path).await);
        let queries = ProductQuery::from_lines(lines.iter().map(String::as_str), &synonyms);
        let extra_sources = read_entries(&self.urls_path)
            .await
            .into_iter()
            .map(SourceConfig::generic)
            .collect::<Vec<_>>();

        debug!(
            "📋 {} queries, {} synonym entries, {} extra sources",
            queries.len(),
            synonyms.len(),
            extra_sources.len()
        );
        QueryInputs {
            queries,
            synonyms,
            extra_sources,
        }
    }
}

async fn read_entries(path: &Path) -> Vec<String> {
    match fs::read_to_string(path).await {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!("⚠️ Cannot read {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Synonym table; missing or malformed files give an empty table
pub async fn load_synonyms(path: &Path) -> SynonymTable {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return SynonymTable::new(),
        Err(e) => {
            warn!("⚠️ Cannot read synonyms {}: {}", path.display(), e);
            return SynonymTable::new();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!("⚠️ Malformed synonyms {}: {}", path.display(), e);
        SynonymTable::new()
    })
}

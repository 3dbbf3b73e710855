//! Domain module - product matching and notification state
//!
//! Pure logic without I/O: text normalization, product-type classification,
//! query expansion and matching, identity building, the availability state
//! machine and the product cache model.

pub mod availability;
pub mod candidate;
pub mod constants;
pub mod filters;
pub mod identity;
pub mod keywords;
pub mod matcher;
pub mod normalizer;
pub mod product_cache;
pub mod product_type;

pub use availability::{OutOfStockSet, SeenSet, StatusUpdate, StockLedger, StockStatus, update_status};
pub use candidate::{Candidate, ProductData, ScrapeOutcome};
pub use identity::{ProductIdentity, SeriesTable, build_identity};
pub use keywords::{ProductQuery, SynonymTable, TokenSet};
pub use matcher::{MatchSettings, matches, strict_matches};
pub use product_cache::{ProductCache, ProductCacheEntry};
pub use product_type::{ProductType, classify};

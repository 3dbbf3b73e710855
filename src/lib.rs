//! TCG Stock Watch - restock notifications for trading-card shops
//!
//! Polls shop listing pages, matches link titles against user-authored
//! product queries, tracks per-product availability and sends deduplicated
//! notifications when a product appears, sells out or comes back in stock.
//!
//! - `domain`: normalizer, classifier, matcher, identities, availability
//!   state machine and product cache
//! - `infrastructure`: configuration, logging, HTTP fetching, scraping,
//!   persistence and notification delivery
//! - `application`: scan cycles, digests, scheduling and the run loop

pub mod application;
pub mod domain;
pub mod infrastructure;

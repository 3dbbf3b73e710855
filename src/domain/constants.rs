//! Domain constants for matching, caching and scheduling
//!
//! Defaults shared by the domain layer and the configuration defaults.

/// Matching defaults
pub mod matching {
    /// Minimum share of required tokens a candidate has to contain
    pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.75;

    /// Threshold used by the whole-word confirmation check
    pub const DEFAULT_STRICT_THRESHOLD: f64 = 0.75;
}

/// Product cache defaults
pub mod cache {
    /// Minimum seconds between two detail fetches of a cached product URL (2h)
    pub const DEFAULT_COOLDOWN_SECS: u64 = 7_200;

    /// Entries not refreshed for this long are pruned (24h)
    pub const DEFAULT_MAX_AGE_SECS: u64 = 86_400;

    /// Number of hex characters kept from the URL hash for path ids
    pub const PATH_ID_HEX_LEN: usize = 16;
}

/// Scan loop defaults
pub mod scan {
    /// Loop interval when no schedule window applies
    pub const DEFAULT_INTERVAL_SECS: u64 = 300;

    /// Upper bound for the generic-source worker pool
    pub const DEFAULT_MAX_PARALLEL_SOURCES: usize = 8;

    /// Maximum events per notification digest
    pub const DEFAULT_DIGEST_BATCH_SIZE: usize = 20;

    /// Longest message the chat channel accepts, in UTF-16 code units
    pub const MAX_MESSAGE_UTF16_UNITS: usize = 4_096;

    /// Consecutive failed cycles before the operator is alerted
    pub const DEFAULT_ALERT_AFTER_FAILURES: u32 = 3;
}

/// Persisted marker suffixes of the seen set
pub mod markers {
    pub const STATUS_SEPARATOR: &str = "_status_";
    pub const AVAILABLE: &str = "available";
    pub const UNAVAILABLE: &str = "unavailable";
}

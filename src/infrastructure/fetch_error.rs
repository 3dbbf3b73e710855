//! Fetch error taxonomy
//!
//! Transient errors are retried with backoff, permanent ones evict cache
//! entries, everything else fails the fetch immediately.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {code} from {url}")]
    Status { url: String, code: u16 },

    #[error("TLS error for {url}: {message}")]
    Tls { url: String, message: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Failed to read body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Worth another attempt: timeouts, connection failures, 5xx and 429
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } | Self::Body { .. } => true,
            Self::Status { code, .. } => *code == 429 || (500..600).contains(code),
            Self::Tls { .. } | Self::InvalidUrl { .. } | Self::RetriesExhausted { .. } => false,
        }
    }

    /// The resource is gone for good (404, 410)
    pub fn is_permanent(&self) -> bool {
        matches!(self.status(), Some(404 | 410))
    }

    /// HTTP status behind the error, looking through exhausted retries
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Connection { url, .. }
            | Self::Status { url, .. }
            | Self::Tls { url, .. }
            | Self::InvalidUrl { url }
            | Self::Body { url, .. }
            | Self::RetriesExhausted { url, .. } => url,
        }
    }

    /// Map a reqwest failure onto the taxonomy
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            return Self::Timeout { url };
        }
        if let Some(status) = error.status() {
            return Self::Status { url, code: status.as_u16() };
        }
        if error.is_builder() {
            return Self::InvalidUrl { url };
        }
        let message = error.to_string();
        if message.to_lowercase().contains("certificate") || message.to_lowercase().contains("tls") {
            return Self::Tls { url, message };
        }
        if error.is_body() || error.is_decode() {
            return Self::Body { url, message };
        }
        Self::Connection { url, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn status(code: u16) -> FetchError {
        FetchError::Status { url: "https://shop/p".into(), code }
    }

    #[rstest]
    #[case(status(500), true, false)]
    #[case(status(503), true, false)]
    #[case(status(429), true, false)]
    #[case(status(404), false, true)]
    #[case(status(410), false, true)]
    #[case(status(403), false, false)]
    #[case(FetchError::Timeout { url: "u".into() }, true, false)]
    #[case(FetchError::Connection { url: "u".into(), message: "reset".into() }, true, false)]
    #[case(FetchError::InvalidUrl { url: "u".into() }, false, false)]
    fn classifies_errors(#[case] error: FetchError, #[case] transient: bool, #[case] permanent: bool) {
        assert_eq!(error.is_transient(), transient);
        assert_eq!(error.is_permanent(), permanent);
    }

    #[test]
    fn exhausted_retries_keep_status() {
        let error = FetchError::RetriesExhausted {
            url: "https://shop/p".into(),
            attempts: 3,
            last: Box::new(status(503)),
        };
        assert_eq!(error.status(), Some(503));
        assert!(!error.is_transient());
        assert_eq!(error.url(), "https://shop/p");
    }
}

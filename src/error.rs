//! Custom error types for orrery

use thiserror::Error;

/// Main error type for orrery operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The provider answered, but not with the shape we expect
    #[error("Bad upstream response from {context}: {payload}")]
    BadUpstreamResponse {
        context: String,
        payload: serde_json::Value,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid post: {0}")]
    InvalidPost(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Announce error: {0}")]
    Announce(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a shape error carrying the raw payload for diagnostics
    pub fn bad_upstream(context: impl Into<String>, payload: serde_json::Value) -> Self {
        Error::BadUpstreamResponse {
            context: context.into(),
            payload,
        }
    }

    /// True only for storage faults worth waiting out: a busy or locked
    /// database, or a pool that could not hand out a connection in time.
    pub fn is_transient_storage(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            Error::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref().map_or(false, is_busy_or_locked_code)
            }
            _ => false,
        }
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and every extended code built on them
fn is_busy_or_locked_code(code: &str) -> bool {
    code.parse::<i32>()
        .map_or(false, |code| matches!(code & 0xff, 5 | 6))
}

/// Result type alias for orrery
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_predicate_is_narrow() {
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_transient_storage());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_transient_storage());
        assert!(!Error::NotFound("x".to_string()).is_transient_storage());
        assert!(!Error::bad_upstream("feed", serde_json::json!([])).is_transient_storage());
    }

    #[test]
    fn test_busy_and_locked_codes_include_extended_forms() {
        for code in ["5", "6", "261", "262", "517", "773"] {
            assert!(is_busy_or_locked_code(code), "{}", code);
        }
        // SQLITE_CONSTRAINT, SQLITE_CONSTRAINT_NOTNULL, SQLITE_READONLY
        for code in ["19", "1299", "8", "not-a-code"] {
            assert!(!is_busy_or_locked_code(code), "{}", code);
        }
    }

    #[test]
    fn test_bad_upstream_display_includes_payload() {
        let err = Error::bad_upstream("neo feed", serde_json::json!({"error": "nope"}));
        let msg = err.to_string();
        assert!(msg.contains("neo feed"));
        assert!(msg.contains("nope"));
    }
}

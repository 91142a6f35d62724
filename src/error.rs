//! Error types for duck-explore.
//!
//! Defines the main error enum used throughout the application, plus the
//! classification of raw engine error text into presentable categories.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::result::ResultKind;

/// Main error type for duck-explore operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExploreError {
    /// Session initialization failed (bad credential, engine unreachable, etc.)
    #[error("Connection initialization failed: {0}")]
    ConnectionInitialization(String),

    /// An operation needed a connection and none was available.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The engine returned a result shape other than the one requested.
    #[error("Unexpected result shape: expected {expected} result, got {actual}")]
    ResultShape {
        expected: ResultKind,
        actual: ResultKind,
    },

    /// The query references a catalog, share or table the account has not attached.
    #[error("Missing data source: {message}")]
    MissingDataSource {
        /// Name of the missing catalog or table, when the engine reported one.
        name: Option<String>,
        /// Original engine message.
        message: String,
    },

    /// Query execution errors (syntax errors, type errors, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Credential acquisition errors (empty token, clipboard unavailable, etc.)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Configuration errors (invalid config file, bad endpoint URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (terminal failures, unexpected states, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExploreError {
    /// Creates a connection initialization error with the given message.
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::ConnectionInitialization(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an authentication error with the given message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classifies a raw engine error message.
    ///
    /// Messages about catalogs, shares or tables that do not exist become
    /// [`ExploreError::MissingDataSource`]; everything else is a query error.
    pub fn from_engine_message(msg: impl Into<String>) -> Self {
        let message = msg.into();
        match missing_source_name(&message) {
            Some(name) => Self::MissingDataSource { name, message },
            None => Self::Query(message),
        }
    }

    /// Returns true if this error means the data source is not attached.
    pub fn is_missing_data_source(&self) -> bool {
        matches!(self, Self::MissingDataSource { .. })
    }

    /// Returns instructions for attaching the missing data source, if applicable.
    pub fn attach_hint(&self) -> Option<String> {
        match self {
            Self::MissingDataSource { name: Some(name), .. } => {
                let database = name.split('.').next().unwrap_or(name);
                Some(format!(
                    "'{database}' is not attached to this account. Attach the share first, \
                     e.g. ATTACH 'md:_share/{database}/<share-id>' AS {database};"
                ))
            }
            Self::MissingDataSource { name: None, .. } => Some(
                "A referenced database or share is not attached to this account. \
                 Attach it with ATTACH '<share url>' and try again."
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConnectionInitialization(_) | Self::Connection(_) => "Connection Error",
            Self::ResultShape { .. } => "Result Shape Error",
            Self::MissingDataSource { .. } => "Missing Data Source",
            Self::Query(_) => "Query Error",
            Self::Auth(_) => "Authentication Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<arrow::error::ArrowError> for ExploreError {
    fn from(e: arrow::error::ArrowError) -> Self {
        Self::Query(format!("Arrow error: {e}"))
    }
}

/// Result type alias using ExploreError.
pub type Result<T> = std::result::Result<T, ExploreError>;

fn missing_source_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)catalog\s+"?([\w.]+)"?\s+does not exist"#,
            r#"(?i)table with name\s+"?([\w.]+)"?\s+does not exist"#,
            r#"(?i)database\s+"?([\w.]+)"?\s+(?:does not exist|not found)"#,
            r#"(?i)share\s+"?([\w./:]+)"?\s+(?:is not attached|not found|does not exist)"#,
            r"(?i)catalog error:.*\bnot attached\b",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Returns `Some(name)` if `message` reports a missing data source.
fn missing_source_name(message: &str) -> Option<Option<String>> {
    missing_source_patterns().iter().find_map(|re| {
        re.captures(message)
            .map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
    })
}

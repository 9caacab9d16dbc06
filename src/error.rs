use std::error::Error as _;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PgScopeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Statement-level failure; `message` is the engine's own diagnostic.
    #[error("Query error: {message}")]
    QueryError {
        message: String,
        code: Option<String>,
    },
}

impl PgScopeError {
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }

    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }

    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Self::QueryError { .. })
    }

    /// SQLSTATE reported by the engine, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::QueryError { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
            code: None,
        }
    }

    /// Wrap a failure raised while establishing a connection.
    pub(crate) fn connect(err: &postgres::Error) -> Self {
        Self::ConnectionError(format!("postgres connect error: {err}"))
    }

    /// Classify a failure raised by a statement round-trip.
    pub(crate) fn from_statement(err: postgres::Error, action: &str) -> Self {
        if err.is_closed() || has_io_source(&err) {
            return Self::ConnectionError(format!("postgres {action} error: {err}"));
        }
        if let Some(db) = err.as_db_error() {
            let message = match db.detail() {
                Some(detail) => format!("{}: {detail}", db.message()),
                None => db.message().to_string(),
            };
            return Self::QueryError {
                message,
                code: Some(db.code().code().to_string()),
            };
        }
        Self::query(format!("postgres {action} error: {}", describe(&err)))
    }
}

/// Driver error text plus its source; client-side encode and decode failures
/// keep their reason only in the source.
pub(crate) fn describe(err: &postgres::Error) -> String {
    match err.source() {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

fn has_io_source(err: &postgres::Error) -> bool {
    err.source()
        .is_some_and(|source| source.downcast_ref::<io::Error>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_variants() {
        let err = PgScopeError::ConfigError("bad port".into());
        assert!(err.is_config());
        assert!(!err.is_query());

        let err = PgScopeError::ConnectionError("refused".into());
        assert!(err.is_connection());
        assert_eq!(err.code(), None);
    }

    #[test]
    fn query_error_keeps_engine_message_and_code() {
        let err = PgScopeError::QueryError {
            message: "relation \"nope\" does not exist".into(),
            code: Some("42P01".into()),
        };
        assert!(err.is_query());
        assert_eq!(err.code(), Some("42P01"));
        assert_eq!(
            err.to_string(),
            "Query error: relation \"nope\" does not exist"
        );
    }
}

use std::fmt;

use thiserror::Error;

/// Why a caller-supplied parameter was rejected by the binder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// Required parameter was not supplied
    Missing,
    /// Parameter name is not declared by the query
    Unknown,
    /// Value has the wrong shape for the declared type
    WrongType { expected: String, found: String },
    /// Value is not one of the allowed enum members
    NotAllowed { value: String, allowed: Vec<String> },
    /// Numeric value outside the declared bounds
    OutOfRange { value: String, min: i64, max: i64 },
    /// Text value longer than the accepted maximum
    TooLong { len: usize, max: usize },
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "required parameter is missing"),
            Self::Unknown => write!(f, "parameter is not accepted by this query"),
            Self::WrongType { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Self::NotAllowed { value, allowed } => {
                write!(f, "'{value}' is not one of [{}]", allowed.join(", "))
            }
            Self::OutOfRange { value, min, max } => {
                write!(f, "{value} is outside the range {min}..={max}")
            }
            Self::TooLong { len, max } => write!(f, "{len} characters exceeds limit of {max}"),
        }
    }
}

/// Stable error classification for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    UnknownQuery,
    DuplicateQuery,
    Validation,
    Connection,
    SchemaMismatch,
    Execution,
    ReadOnlyViolation,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::UnknownQuery => "unknown_query",
            Self::DuplicateQuery => "duplicate_query",
            Self::Validation => "validation",
            Self::Connection => "connection",
            Self::SchemaMismatch => "schema_mismatch",
            Self::Execution => "execution",
            Self::ReadOnlyViolation => "read_only_violation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Query already registered: {0}")]
    DuplicateQuery(String),

    #[error("Invalid parameter '{parameter}': {reason}")]
    Validation {
        parameter: String,
        reason: ValidationReason,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    /// Failure reported by the warehouse for a statement it accepted.
    /// The executor wraps this into [`Error::Execution`].
    #[error("Query failed: {0}")]
    Query(String),

    #[error(
        "Result schema mismatch for '{query}': expected [{}], got [{}]",
        .expected.join(", "),
        .actual.join(", ")
    )]
    SchemaMismatch {
        query: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Execution of '{query}' failed after {attempts} attempt(s): {source}")]
    Execution {
        query: String,
        attempts: u32,
        #[source]
        source: Box<Self>,
    },

    #[error("Read-only mode: {0}")]
    ReadOnlyViolation(String),
}

impl Error {
    pub fn validation(parameter: impl Into<String>, reason: ValidationReason) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            reason,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::UnknownQuery(_) => ErrorKind::UnknownQuery,
            Self::DuplicateQuery(_) => ErrorKind::DuplicateQuery,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Query(_) | Self::Execution { .. } => ErrorKind::Execution,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::ReadOnlyViolation(_) => ErrorKind::ReadOnlyViolation,
        }
    }

    /// The query or parameter name the error is about, if any
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::UnknownQuery(name) | Self::DuplicateQuery(name) => Some(name),
            Self::Validation { parameter, .. } => Some(parameter),
            Self::SchemaMismatch { query, .. } | Self::Execution { query, .. } => Some(query),
            Self::Config(_) | Self::Connection(_) | Self::Query(_) | Self::ReadOnlyViolation(_) => {
                None
            }
        }
    }

    /// Only connection-level failures are worth retrying
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_unknown_query(&self) -> bool {
        matches!(self, Self::UnknownQuery(_))
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    #[must_use]
    pub const fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. })
    }

    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_predicate() {
        assert!(Error::Connection("refused".into()).is_transient());
        assert!(!Error::Config("missing host".into()).is_transient());
        assert!(!Error::Query("syntax error".into()).is_transient());
        assert!(!Error::UnknownQuery("x".into()).is_transient());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::Config(String::new()).kind(), ErrorKind::Configuration);
        assert_eq!(Error::Query(String::new()).kind(), ErrorKind::Execution);
        assert_eq!(
            Error::validation("limit", ValidationReason::Missing).kind(),
            ErrorKind::Validation
        );
        assert_eq!(ErrorKind::SchemaMismatch.as_str(), "schema_mismatch");
    }

    #[test]
    fn test_validation_display_names_parameter() {
        let err = Error::validation(
            "status",
            ValidationReason::NotAllowed {
                value: "closed".into(),
                allowed: vec!["active".into(), "other".into()],
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("status"));
        assert!(msg.contains("closed"));
        assert!(msg.contains("active, other"));
        assert_eq!(err.identifier(), Some("status"));
    }

    #[test]
    fn test_execution_preserves_source() {
        let err = Error::Execution {
            query: "loan_summary".into(),
            attempts: 3,
            source: Box::new(Error::Connection("timed out".into())),
        };
        assert!(err.is_execution());
        assert_eq!(err.identifier(), Some("loan_summary"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("timed out"));
        assert!(err.to_string().contains("3 attempt"));
    }

    #[test]
    fn test_schema_mismatch_display() {
        let err = Error::SchemaMismatch {
            query: "grade_analysis".into(),
            expected: vec!["grade".into(), "loan_count".into()],
            actual: vec!["grade".into()],
        };
        assert!(err.is_schema_mismatch());
        assert!(err.to_string().contains("grade, loan_count"));
    }

    #[test]
    fn test_out_of_range_display() {
        let reason = ValidationReason::OutOfRange {
            value: "0".into(),
            min: 1,
            max: 100,
        };
        assert_eq!(reason.to_string(), "0 is outside the range 1..=100");
    }
}

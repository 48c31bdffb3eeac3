//! Error types for the extractor.
//!
//! Every variant aborts the run it is raised in. Variants raised while
//! traversing input carry the element path or row number they were raised at.

use thiserror::Error;

/// Main error type for the extractor library.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// Mapper specification rejected at construction.
    #[error("Invalid mapper{}: {reason}", .target.as_ref().map(|t| format!(" for \"{t}\"")).unwrap_or_default())]
    InvalidMapper {
        target: Option<String>,
        reason: String,
    },

    /// Configuration value rejected before the run started.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input could not be opened or turned into a parsing session.
    #[error("Could not open input: {0}")]
    InputOpenFailed(String),

    /// Structural error reported by the parser or while materializing a subtree.
    #[error("\"{path}\"{} {message}", .line.map(|l| format!(" @ line #{l}")).unwrap_or_default())]
    MalformedInput {
        path: String,
        line: Option<usize>,
        message: String,
    },

    /// A path-query failed to compile or evaluate.
    #[error("Invalid XPath expression: \"{expression}\" ({reason})")]
    InvalidExpression { expression: String, reason: String },

    /// A back-reference pointed at a key that was never stored.
    #[error("Unknown element: \"{0}\"")]
    UnknownElement(String),

    /// A declared column index is absent from a row.
    #[error("Invalid column {column} @ line {line} for property \"{property}\"")]
    InvalidColumn {
        column: usize,
        line: usize,
        property: String,
    },

    /// The user callback reported a failure.
    #[error("Callback failed at {context}: {message}")]
    CallbackFailed {
        context: String,
        message: String,
        code: Option<i64>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractorError {
    /// Build an `InvalidMapper` error without a target.
    pub fn invalid_mapper(reason: impl Into<String>) -> Self {
        Self::InvalidMapper {
            target: None,
            reason: reason.into(),
        }
    }

    /// Attach the mapper target to an `InvalidMapper` error.
    #[must_use]
    pub fn for_target(self, name: &str) -> Self {
        match self {
            Self::InvalidMapper { target: None, reason } => Self::InvalidMapper {
                target: Some(name.to_string()),
                reason,
            },
            other => other,
        }
    }

    /// Error code carried over from a failed callback, if any.
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::CallbackFailed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Result type alias for extractor operations.
pub type Result<T> = std::result::Result<T, ExtractorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_with_line() {
        let err = ExtractorError::MalformedInput {
            path: "catalog/book".to_string(),
            line: Some(12),
            message: "unexpected end of stream".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "\"catalog/book\" @ line #12 unexpected end of stream"
        );
    }

    #[test]
    fn test_malformed_input_without_line() {
        let err = ExtractorError::MalformedInput {
            path: "catalog".to_string(),
            line: None,
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "\"catalog\" bad");
    }

    #[test]
    fn test_invalid_mapper_target() {
        let err = ExtractorError::invalid_mapper("Mapper properties empty/not set").for_target("a/b");
        assert_eq!(
            err.to_string(),
            "Invalid mapper for \"a/b\": Mapper properties empty/not set"
        );
    }

    #[test]
    fn test_callback_code_preserved() {
        let err = ExtractorError::CallbackFailed {
            context: "line 3".to_string(),
            message: "boom".to_string(),
            code: Some(42),
        };
        assert_eq!(err.code(), Some(42));
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().contains("line 3"));
    }
}

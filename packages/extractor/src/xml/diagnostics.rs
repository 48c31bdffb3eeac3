//! Per-run channel for parser findings.

use std::fmt;

use crate::error::{ExtractorError, Result};

/// Severity of a parser finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Recoverable; reported and the run continues.
    Warning,
    /// Structural error; aborts the run.
    Error,
    /// Unrecoverable structural error; aborts the run.
    Fatal,
}

/// One parser finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Element path the finding was raised at.
    pub path: String,
    /// 1-based line in the input.
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    /// Create a warning.
    pub fn warning(path: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an error.
    pub fn error(path: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a fatal error.
    pub fn fatal(path: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            ..Self::error(path, line, message)
        }
    }

    /// Whether this finding aborts the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity > Severity::Warning
    }

    fn to_error(&self) -> ExtractorError {
        ExtractorError::MalformedInput {
            path: self.path.clone(),
            line: self.line,
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.path)?;
        if let Some(line) = self.line {
            write!(f, " @ line #{line}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Findings collected during one run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding.
    ///
    /// Warnings are logged and kept; anything above warning severity is kept
    /// and returned as `MalformedInput`.
    ///
    /// # Errors
    /// Returns `MalformedInput` for error and fatal findings.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<()> {
        let outcome = if diagnostic.is_fatal() {
            Err(diagnostic.to_error())
        } else {
            tracing::warn!(
                path = %diagnostic.path,
                line = ?diagnostic.line,
                "{}",
                diagnostic.message
            );
            Ok(())
        };
        self.entries.push(diagnostic);
        outcome
    }

    /// Record a finding that ends the run and return the error to raise.
    pub fn abort(&mut self, diagnostic: Diagnostic) -> ExtractorError {
        let error = diagnostic.to_error();
        self.entries.push(diagnostic);
        error
    }

    /// All recorded findings.
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Recorded warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| !d.is_fatal())
    }
}

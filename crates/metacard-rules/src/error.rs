//! Error types for rule loading
//!
//! Per-rule problems never surface here; they become
//! [`Diagnostic`](crate::Diagnostic)s on the load report and the rule is
//! skipped. These errors cover the document as a whole.

use crate::diagnostics::Diagnostic;
use std::path::PathBuf;

/// Template syntax error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("template error at byte {position}: {message}")]
pub struct TemplateError {
    /// Byte offset into the template source
    pub position: usize,
    /// What is wrong
    pub message: String,
}

impl TemplateError {
    /// Create template error
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Errors raised while loading a rule document
#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    /// Document is not valid YAML/JSON or does not fit the schema
    #[error("malformed rule document: {0}")]
    Malformed(String),

    /// Strict loading rejected the document because some rules were invalid
    #[error("{} rule(s) rejected, first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Rejected(Vec<Diagnostic>),

    /// IO error while reading a rule document
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for rule loading
pub type RuleResult<T> = Result<T, RuleLoadError>;

//! Rule diagnostics
//!
//! Invalid rules are skipped rather than aborting a load or a settle pass.
//! Each skip is recorded as a [`Diagnostic`] so callers can surface it.

use crate::rule::RuleId;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Rule still loaded, something was ignored
    Warning,
    /// Rule (or effect) skipped
    Error,
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Selector names no known definition
    UnknownSelector,
    /// Template could not be parsed
    MalformedTemplate,
    /// Condition needs values but lists none
    EmptyCondition,
    /// Condition value is not a valid value of the lookup property
    UnknownLookupValue,
    /// Values listed for an operator that takes none
    IgnoredValues,
    /// Effect is missing its payload
    MissingPayload,
    /// Rule skipped because its parent was skipped
    ParentSkipped,
    /// Binding would make a placeholder chain cyclic
    BindingCycle,
    /// Effect target is not on the card
    AbsentTarget,
}

/// One diagnostic entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Compiled rule, if the rule made it into the rule set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleId>,
    /// Rule path as written (`Parent > Child`)
    pub rule_name: String,
    /// Severity
    pub severity: Severity,
    /// Category
    pub kind: DiagnosticKind,
    /// Human-readable detail
    pub message: String,
}

impl Diagnostic {
    /// Error-level diagnostic
    pub fn error(rule_name: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            rule: None,
            rule_name: rule_name.into(),
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }

    /// Warning-level diagnostic
    pub fn warning(
        rule_name: impl Into<String>,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(rule_name, kind, message)
        }
    }

    /// Attach the compiled rule ID
    #[inline]
    #[must_use]
    pub fn for_rule(mut self, rule: RuleId) -> Self {
        self.rule = Some(rule);
        self
    }

    /// True for error severity
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}[{:?}] {}: {}", self.kind, self.rule_name, self.message)
    }
}

/// Outcome of loading a rule document
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Rules compiled into the set (children included)
    pub loaded: usize,
    /// Rules skipped (children of skipped rules included)
    pub skipped: usize,
    /// All diagnostics, in document order
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadReport {
    /// Error-level diagnostics only
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// True when nothing was skipped or ignored
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

//! Engine configuration
//!
//! Read from TOML; every key is optional and unknown keys are rejected.
//!
//! ```toml
//! max_iterations = 64
//! default_delimiter = "; "
//! strict_rules = false
//! treat_unchanged_write_as_edit = false
//! ```

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default settle iteration ceiling
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

/// Default delimiter for multi-value placeholders
pub const DEFAULT_DELIMITER: &str = "; ";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Settle passes allowed before a change is reported as non-terminating
    pub max_iterations: usize,
    /// Delimiter used when a rule does not set its own
    pub default_delimiter: String,
    /// Reject rule documents with error diagnostics instead of skipping rules
    pub strict_rules: bool,
    /// Count a user write of the current value as an edit
    pub treat_unchanged_write_as_edit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            default_delimiter: DEFAULT_DELIMITER.to_string(),
            strict_rules: false,
            treat_unchanged_write_as_edit: false,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set iteration ceiling
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set default delimiter
    #[must_use]
    pub fn with_default_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.default_delimiter = delimiter.into();
        self
    }

    /// Enable or disable strict rule loading
    #[must_use]
    pub fn with_strict_rules(mut self, strict: bool) -> Self {
        self.strict_rules = strict;
        self
    }

    /// Count unchanged writes as edits
    #[must_use]
    pub fn with_unchanged_write_as_edit(mut self, enabled: bool) -> Self {
        self.treat_unchanged_write_as_edit = enabled;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// [`EngineError::Config`] on syntax errors, unknown keys or a zero
    /// iteration ceiling.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// IO failure or an invalid configuration.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// [`EngineError::Config`] when `max_iterations` is zero.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_iterations == 0 {
            return Err(EngineError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

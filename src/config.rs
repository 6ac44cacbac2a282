//! Configuration for the load pass and the composed template sets
//!
//! Configuration can be built in code or read from a TOML file:
//!
//! ```toml
//! [loader]
//! suffix = ".html"
//! failure_policy = "skip"
//! escape = "none"
//! max_depth = 64
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::{EscapeMode, DEFAULT_MAX_DEPTH};

/// Errors that can occur when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// What a load pass does when one leaf file fails to compose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole load with the first error
    #[default]
    Abort,
    /// Log the failure, leave the file out of the registry and continue
    Skip,
}

/// Configuration options for loading and composing templates
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// File suffix of leaf templates; also marks `template` names that refer to files
    pub suffix: String,

    /// Behavior when a leaf file fails to compose
    pub failure_policy: FailurePolicy,

    /// Escaping applied to action output
    pub escape: EscapeMode,

    /// Maximum nesting of `template` invocations at render time
    pub max_depth: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            suffix: ".html".to_string(),
            failure_policy: FailurePolicy::Abort,
            escape: EscapeMode::Html,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// TOML structure for deserializing configuration
#[derive(Deserialize)]
struct TomlConfig {
    loader: Option<TomlLoader>,
}

#[derive(Deserialize)]
struct TomlLoader {
    suffix: Option<String>,
    failure_policy: Option<FailurePolicy>,
    escape: Option<EscapeMode>,
    max_depth: Option<usize>,
}

impl LoaderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string; missing keys keep their defaults
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(loader) = parsed.loader {
            if let Some(suffix) = loader.suffix {
                config.suffix = suffix;
            }
            if let Some(policy) = loader.failure_policy {
                config.failure_policy = policy;
            }
            if let Some(escape) = loader.escape {
                config.escape = escape;
            }
            if let Some(depth) = loader.max_depth {
                config.max_depth = depth;
            }
        }

        Ok(config)
    }

    /// Set the leaf template suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the escaping mode
    pub fn with_escape(mut self, escape: EscapeMode) -> Self {
        self.escape = escape;
        self
    }

    /// Set the template invocation depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether a `template` name refers to another file rather than a block
    pub fn is_file_reference(&self, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }
}

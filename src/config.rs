//! Index configuration
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! ignored_names = ["CVS", ".git", "*.pyc"]
//! package_separator = "."
//! exclude_compiler_output = true
//!
//! [scan]
//! follow_links = false
//! respect_gitignore = false
//! ```
//!
//! Every field is optional; a missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{IndexError, Result};
use crate::patterns::NamePatterns;

/// Names ignored everywhere unless registered as a root
pub const DEFAULT_IGNORED_NAMES: &[&str] = &[
    "*.hprof",
    "*.pyc",
    "*.pyo",
    "*.rbc",
    "*.yarb",
    "*~",
    ".DS_Store",
    ".git",
    ".hg",
    ".svn",
    "CVS",
    "__pycache__",
    "_svn",
    "vssver.scc",
    "vssver2.scc",
];

/// Root-index configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Global ignored-name globs
    #[serde(default = "default_ignored_names")]
    pub ignored_names: Vec<String>,

    /// Separator used when joining package segments
    #[serde(default = "default_package_separator")]
    pub package_separator: String,

    /// Whether module compiler outputs are excluded by default
    #[serde(default = "default_true")]
    pub exclude_compiler_output: bool,

    /// Disk scan settings for `refresh_from_disk`
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Settings for seeding the path table from a real directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Follow symbolic links while walking
    #[serde(default)]
    pub follow_links: bool,

    /// Skip entries matched by `.gitignore` files
    #[serde(default)]
    pub respect_gitignore: bool,
}

fn default_ignored_names() -> Vec<String> {
    DEFAULT_IGNORED_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_package_separator() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ignored_names: default_ignored_names(),
            package_separator: default_package_separator(),
            exclude_compiler_output: true,
            scan: ScanConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| IndexError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IndexError::Config {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    /// Check field values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.package_separator.is_empty() {
            return Err(IndexError::Config {
                message: "package_separator must not be empty".to_string(),
            });
        }
        NamePatterns::new(&self.ignored_names)?;
        Ok(())
    }

    /// Compile the ignored-name globs
    pub fn ignored_patterns(&self) -> Result<NamePatterns> {
        NamePatterns::new(&self.ignored_names)
    }
}

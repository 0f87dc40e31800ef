//! Run configuration.
//!
//! Resolved from environment variables with defaults; the binaries let CLI
//! arguments override each value.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `CODEBASE_DIR` | `../codebase` | codebase root |
//! | `CODEBASE_AS_OF` | today | processing date, `yyyyMMdd` or `yyyy-MM-dd` |
//!
//! Layout under the codebase root:
//!
//! ```text
//! <root>/base/sets/*.xml     registry documents
//! <root>/base/Compiled.xml   consolidated output
//! <root>/cdc-source/         source feeds
//! ```

use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};

use crate::lifecycle::parse_as_of;
use crate::sources::SourcePaths;

/// Default codebase root.
pub const DEFAULT_CODEBASE_DIR: &str = "../codebase";

/// Error type for configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required directory does not exist.
    #[error("Can't open directory: {0}")]
    MissingDirectory(PathBuf),
    /// A required source feed does not exist.
    #[error("Can't open source file: {0}")]
    MissingSource(PathBuf),
    /// A date setting could not be parsed.
    #[error("Invalid date for {name}: '{value}' (expected yyyyMMdd or yyyy-MM-dd)")]
    InvalidDate {
        /// Setting name.
        name: String,
        /// Offending value.
        value: String,
    },
}

/// Configuration of an update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Codebase root.
    pub codebase_dir: PathBuf,
    /// Processing date.
    pub as_of: NaiveDate,
    /// Run the pipeline without saving.
    pub dry_run: bool,
}

impl UpdateConfig {
    /// Configuration for `codebase_dir` processed on `as_of`.
    pub fn new(codebase_dir: impl Into<PathBuf>, as_of: NaiveDate) -> Self {
        Self {
            codebase_dir: codebase_dir.into(),
            as_of,
            dry_run: false,
        }
    }

    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let codebase_dir = lookup("CODEBASE_DIR")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CODEBASE_DIR.to_string());
        let as_of = match lookup("CODEBASE_AS_OF").filter(|s| !s.trim().is_empty()) {
            Some(text) => parse_date_setting("CODEBASE_AS_OF", &text)?,
            None => Local::now().date_naive(),
        };
        Ok(Self::new(codebase_dir, as_of))
    }

    /// `<root>/base`
    pub fn base_dir(&self) -> PathBuf {
        self.codebase_dir.join("base")
    }

    /// `<root>/base/sets`
    pub fn sets_dir(&self) -> PathBuf {
        self.base_dir().join("sets")
    }

    /// `<root>/cdc-source`
    pub fn cdc_source_dir(&self) -> PathBuf {
        self.codebase_dir.join("cdc-source")
    }

    /// Resolve every source feed and check the inputs exist.
    pub fn source_paths(&self) -> Result<SourcePaths, ConfigError> {
        for dir in [self.codebase_dir.clone(), self.sets_dir(), self.cdc_source_dir()] {
            require_dir(&dir)?;
        }
        let paths = SourcePaths::in_dir(&self.cdc_source_dir());
        if let Some(missing) = paths.first_missing() {
            return Err(ConfigError::MissingSource(missing.to_path_buf()));
        }
        Ok(paths)
    }
}

/// Parse a date setting.
pub fn parse_date_setting(name: &str, text: &str) -> Result<NaiveDate, ConfigError> {
    parse_as_of(text).ok_or_else(|| ConfigError::InvalidDate {
        name: name.to_string(),
        value: text.to_string(),
    })
}

/// Fail unless `dir` is an existing directory.
pub fn require_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingDirectory(dir.to_path_buf()))
    }
}

//! Configuration file handling for feedctl.
//!
//! The configuration file is the persistent store behind `feedctl source`:
//! it holds the list of named package feeds, the defaults used by
//! `feedctl push`, and where the credential passphrase comes from.
//!
//! # Example
//!
//! ```
//! use feedctl_config::{Config, SourceEntry};
//!
//! let mut config = Config::new();
//! config.add_source(SourceEntry::new("bob", "https://feed.example/v2/"));
//!
//! assert!(config.find_source("BOB").is_some());
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use feedctl_encrypt::EncryptionConfig;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "config.toml";

/// Directory under the user's home holding [`CONFIG_FILE`].
pub const CONFIG_DIR: &str = ".feedctl";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "FEEDCTL_CONFIG";

/// Complete feedctl configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Named package feeds, in the order they were added.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceEntry>,
    /// Defaults for `feedctl push`.
    #[serde(default)]
    push: PushConfig,
    /// Passphrase source for stored passwords.
    #[serde(default)]
    encryption: EncryptionConfig,
}

/// One configured package feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    /// Feed URL or file-system location.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Encrypted password blob, never plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SourceEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user: None,
            password: None,
            disabled: false,
        }
    }

    /// Case-insensitive name comparison, the way sources are looked up.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// Push defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Feed used when `feedctl push` is given no `--source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source: Option<String>,
    /// Upload timeout in seconds. The sign is ignored and zero means the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<i64>,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    /// Look a source up by name, ignoring case.
    pub fn find_source(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.is_named(name))
    }

    pub fn find_source_mut(&mut self, name: &str) -> Option<&mut SourceEntry> {
        self.sources.iter_mut().find(|s| s.is_named(name))
    }

    /// Append a source. Callers check for an existing name first.
    pub fn add_source(&mut self, entry: SourceEntry) {
        self.sources.push(entry);
    }

    /// Remove a source by name, returning it if it was present.
    pub fn remove_source(&mut self, name: &str) -> Option<SourceEntry> {
        let idx = self.sources.iter().position(|s| s.is_named(name))?;
        Some(self.sources.remove(idx))
    }

    pub fn push(&self) -> &PushConfig {
        &self.push
    }

    pub fn encryption(&self) -> &EncryptionConfig {
        &self.encryption
    }
}

/// Resolve the configuration file path.
///
/// Resolution order:
/// 1) an explicit path (the `--config` flag)
/// 2) the `FEEDCTL_CONFIG` environment variable
/// 3) `$HOME/.feedctl/config.toml` (`%USERPROFILE%` on Windows)
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("HOME env var not set; set FEEDCTL_CONFIG or pass --config")?;
    Ok(PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load configuration from a file. A missing file is an empty configuration.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Save configuration, creating the parent directory when needed.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config).context("failed to serialize config to TOML")?;

    std::fs::write(path, content)
        .with_context(|| format!("failed to write config file: {}", path.display()))
}

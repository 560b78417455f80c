//! API key resolution for `feedctl push`.
//!
//! Checked in order:
//! 1. the explicit `--key` value
//! 2. `FEEDCTL_API_KEY_<FEED>`, where `<FEED>` is the source string uppercased
//!    with every non-alphanumeric character replaced by `_`
//! 3. `FEEDCTL_API_KEY`
//!
//! Blank values are skipped at every step.

use std::env::{self, VarError};

use anyhow::{Result, bail};

/// Environment variable holding the fallback API key.
pub const API_KEY_ENV: &str = "FEEDCTL_API_KEY";

/// Prefix of the per-feed API key variables.
pub const API_KEY_ENV_PREFIX: &str = "FEEDCTL_API_KEY_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Explicit,
    EnvFeed,
    EnvDefault,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Explicit => write!(f, "--key"),
            KeySource::EnvFeed => write!(f, "FEEDCTL_API_KEY_<FEED>"),
            KeySource::EnvDefault => write!(f, "FEEDCTL_API_KEY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub source: KeySource,
}

/// `FEEDCTL_API_KEY_<FEED>` for a source string.
pub fn feed_key_var(feeds: &str) -> String {
    let normalized: String = feeds
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{API_KEY_ENV_PREFIX}{normalized}")
}

pub fn resolve_api_key(explicit: Option<&str>, feeds: &str) -> Result<Option<ApiKey>> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(Some(ApiKey {
            key: key.to_string(),
            source: KeySource::Explicit,
        }));
    }

    if let Some(key) = env_key(&feed_key_var(feeds))? {
        return Ok(Some(ApiKey {
            key,
            source: KeySource::EnvFeed,
        }));
    }

    Ok(env_key(API_KEY_ENV)?.map(|key| ApiKey {
        key,
        source: KeySource::EnvDefault,
    }))
}

fn env_key(name: &str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => bail!("{name} is not valid unicode"),
    }
}

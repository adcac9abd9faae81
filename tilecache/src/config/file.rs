//! INI file loading for [`TileCacheConfig`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use super::TileCacheConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or parse the config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(section: &str, key: &str, value: &str, reason: &str) -> Self {
        ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl TileCacheConfig {
    /// Load configuration from a file.
    ///
    /// A missing file yields the defaults. Values present in the file
    /// overlay the defaults and the result is validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| ConfigError::ReadError(ini::Error::Parse(e)))?;
        parse_ini(&ini)
    }
}

fn parse_ini(ini: &Ini) -> Result<TileCacheConfig, ConfigError> {
    let mut config = TileCacheConfig::default();

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("max_size") {
            config.max_size = parse_value("cache", "max_size", v)?;
        }
        if let Some(v) = section.get("worker_count") {
            config.worker_count = parse_value("cache", "worker_count", v)?;
        }
    }

    // [store]
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("path") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.path = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("commit_batch") {
            config.store.commit_batch = parse_value("store", "commit_batch", v)?;
        }
        if let Some(v) = section.get("persist_empty") {
            config.store.persist_empty = parse_bool("store", "persist_empty", v)?;
        }
        if let Some(v) = section.get("on_failure") {
            config.store.on_failure = v
                .parse()
                .map_err(|reason: String| ConfigError::invalid("store", "on_failure", v, &reason))?;
        }
    }

    // [fetch]
    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = section.get("url_template") {
            let v = v.trim();
            if !v.is_empty() {
                config.fetch.url_template = v.to_string();
            }
        }
        if let Some(v) = section.get("timeout") {
            config.fetch.timeout_secs = parse_value("fetch", "timeout", v)?;
        }
        if let Some(v) = section.get("proxy") {
            let v = v.trim();
            config.fetch.proxy = (!v.is_empty()).then(|| v.to_string());
        }
    }

    config.validate()?;
    Ok(config)
}

fn parse_value<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(section, key, value, "must be a positive integer"))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(section, key, value, "must be true or false")),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

//! Configuration loading from the environment and an optional file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate, ValidationError};

pub const SSR_PORT: &str = "SSR_PORT";
pub const SSR_HOST: &str = "SSR_HOST";
pub const API_HOST: &str = "API_HOST";
pub const CLIENT_BUNDLE_HTTP_PATH: &str = "CLIENT_BUNDLE_HTTP_PATH";
pub const BUNDLE_OUTPUT_PATH: &str = "BUNDLE_OUTPUT_PATH";
pub const CLIENT_BUNDLE_CACHE_MAXAGE: &str = "CLIENT_BUNDLE_CACHE_MAXAGE";
pub const NODE_ENV: &str = "NODE_ENV";
pub const APP_ROOT: &str = "APP_ROOT";
pub const METRICS_ADDR: &str = "METRICS_ADDR";

/// Every setting the gateway understands, by environment name.
pub const KEYS: &[&str] = &[
    SSR_PORT,
    SSR_HOST,
    API_HOST,
    CLIENT_BUNDLE_HTTP_PATH,
    BUNDLE_OUTPUT_PATH,
    CLIENT_BUNDLE_CACHE_MAXAGE,
    NODE_ENV,
    APP_ROOT,
    METRICS_ADDR,
];

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A scalar setting as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FileValue {
    Text(String),
    Integer(i64),
    Flag(bool),
}

impl FileValue {
    fn into_string(self) -> String {
        match self {
            FileValue::Text(s) => s,
            FileValue::Integer(i) => i.to_string(),
            FileValue::Flag(b) => b.to_string(),
        }
    }
}

/// Config file layout: one optional scalar per environment variable.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    ssr_port: Option<FileValue>,
    ssr_host: Option<FileValue>,
    api_host: Option<FileValue>,
    client_bundle_http_path: Option<FileValue>,
    bundle_output_path: Option<FileValue>,
    client_bundle_cache_maxage: Option<FileValue>,
    node_env: Option<FileValue>,
    app_root: Option<FileValue>,
    metrics_addr: Option<FileValue>,
    #[serde(flatten)]
    unknown: toml::Table,
}

impl FileSettings {
    fn entries(self) -> [(&'static str, Option<FileValue>); 9] {
        [
            (SSR_PORT, self.ssr_port),
            (SSR_HOST, self.ssr_host),
            (API_HOST, self.api_host),
            (CLIENT_BUNDLE_HTTP_PATH, self.client_bundle_http_path),
            (BUNDLE_OUTPUT_PATH, self.bundle_output_path),
            (CLIENT_BUNDLE_CACHE_MAXAGE, self.client_bundle_cache_maxage),
            (NODE_ENV, self.node_env),
            (APP_ROOT, self.app_root),
            (METRICS_ADDR, self.metrics_addr),
        ]
    }
}

/// Unvalidated settings keyed by environment variable name.
///
/// Empty and whitespace-only values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSettings {
    values: BTreeMap<&'static str, String>,
}

impl RawSettings {
    /// Collect known keys through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        for key in KEYS {
            if let Some(value) = lookup(key) {
                settings.set(*key, value);
            }
        }
        settings
    }

    /// Collect known keys from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document whose keys are the lower-cased variable names.
    ///
    /// Unknown keys are ignored with a warning.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileSettings = toml::from_str(content)?;
        for name in file.unknown.keys() {
            tracing::warn!(key = %name, "Ignoring unknown config file key");
        }

        let mut settings = Self::default();
        for (key, value) in file.entries() {
            if let Some(value) = value {
                settings.set(key, value.into_string());
            }
        }
        Ok(settings)
    }

    /// Read a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Layer `other` on top of `self`; keys set in `other` win.
    pub fn overlay(mut self, other: RawSettings) -> Self {
        self.values.extend(other.values);
        self
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.values.remove(key);
        } else {
            self.values.insert(key, value.trim().to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Load and validate configuration.
///
/// The optional file is the base layer; the process environment wins.
pub fn load_config(file: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let base = match file {
        Some(path) => RawSettings::from_file(path)?,
        None => RawSettings::default(),
    };
    let settings = base.overlay(RawSettings::from_env());

    validate(&settings).map_err(ConfigError::Validation)
}

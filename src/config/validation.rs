//! Configuration validation.
//!
//! # Responsibilities
//! - Require the settings the gateway cannot start without
//! - Parse ports, addresses, modes and cache lifetimes
//! - Resolve static roots against the application root
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RawSettings → Result<ServerConfig, Vec<ValidationError>>
//! - Runs before any socket is bound

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::config::loader::*;
use crate::config::schema::*;

/// Longest cache lifetime advertised, matching browser caps.
pub const MAX_CACHE_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A single invalid or missing setting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{key} is required")]
    Missing { key: &'static str },

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn key(&self) -> &'static str {
        match self {
            ValidationError::Missing { key } | ValidationError::Invalid { key, .. } => key,
        }
    }
}

/// Collects errors while fields are parsed.
struct Checker<'a> {
    settings: &'a RawSettings,
    errors: Vec<ValidationError>,
}

impl<'a> Checker<'a> {
    fn required(&mut self, key: &'static str) -> Option<&'a str> {
        let value = self.settings.get(key);
        if value.is_none() {
            self.errors.push(ValidationError::Missing { key });
        }
        value
    }

    fn parse<T>(&mut self, key: &'static str, value: &str, parse: impl FnOnce(&str) -> Result<T, String>) -> Option<T> {
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                self.errors.push(ValidationError::Invalid {
                    key,
                    value: value.to_string(),
                    reason,
                });
                None
            }
        }
    }

    fn required_parsed<T>(&mut self, key: &'static str, parse: impl FnOnce(&str) -> Result<T, String>) -> Option<T> {
        let value = self.required(key)?;
        self.parse(key, value, parse)
    }

    fn optional_parsed<T>(&mut self, key: &'static str, default: T, parse: impl FnOnce(&str) -> Result<T, String>) -> Option<T> {
        match self.settings.get(key) {
            Some(value) => self.parse(key, value, parse),
            None => Some(default),
        }
    }
}

fn from_str<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| e.to_string())
}

fn mount_path(value: &str) -> Result<String, String> {
    if !value.starts_with('/') {
        return Err("must start with '/'".to_string());
    }
    let trimmed = value.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }
    Ok(trimmed.to_string())
}

/// Parse a cache lifetime in Express `maxAge` syntax.
///
/// A bare number is milliseconds; otherwise a number followed by a unit
/// (`ms`, `s`, `m`, `h`, `d`, `w`, `y` and their long forms).
pub fn parse_max_age(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let amount: f64 = number
        .parse()
        .map_err(|_| format!("expected a number of milliseconds or a duration like 365d, got {value:?}"))?;

    let unit_ms = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "week" | "weeks" => 604_800_000.0,
        "y" | "yr" | "yrs" | "year" | "years" => 31_557_600_000.0,
        other => return Err(format!("unknown duration unit {other:?}")),
    };

    let millis = (amount * unit_ms).round();
    if !millis.is_finite() {
        return Err("duration out of range".to_string());
    }
    Ok(Duration::from_millis(millis as u64).min(MAX_CACHE_AGE))
}

/// Validate raw settings into an immutable [`ServerConfig`].
pub fn validate(settings: &RawSettings) -> Result<ServerConfig, Vec<ValidationError>> {
    let mut check = Checker {
        settings,
        errors: Vec::new(),
    };

    let port = check.required_parsed(SSR_PORT, from_str::<u16>);
    let host = check.optional_parsed(SSR_HOST, ListenerConfig::default().host, from_str::<IpAddr>);
    let api_host = settings.get(API_HOST).unwrap_or("localhost").to_string();
    let http_path = check.required_parsed(CLIENT_BUNDLE_HTTP_PATH, mount_path);
    let output_path = check.required(BUNDLE_OUTPUT_PATH).map(PathBuf::from);
    let max_age = check.required_parsed(CLIENT_BUNDLE_CACHE_MAXAGE, parse_max_age);
    let mode = check.optional_parsed(NODE_ENV, Mode::default(), from_str::<Mode>);
    let metrics_address = check.optional_parsed(METRICS_ADDR, None, |v| {
        from_str::<SocketAddr>(v).map(Some)
    });
    let app_root = PathBuf::from(settings.get(APP_ROOT).unwrap_or("."));

    match (port, host, http_path, output_path, max_age, mode, metrics_address) {
        (Some(port), Some(host), Some(http_path), Some(output_path), Some(cache_max_age), Some(mode), Some(metrics_address))
            if check.errors.is_empty() =>
        {
            Ok(ServerConfig {
                listener: ListenerConfig { host, port },
                upstream: UpstreamConfig {
                    host: api_host,
                    ..UpstreamConfig::default()
                },
                bundle: BundleConfig {
                    http_path,
                    client_dir: app_root.join(output_path).join("client"),
                    cache_max_age,
                },
                public_dir: app_root.join("public"),
                mode,
                observability: ObservabilityConfig { metrics_address },
            })
        }
        _ => Err(check.errors),
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Client settings are read from the environment; the CLI overrides them
//! with flags.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CRM_API_BASE_URL` | Base URL of the CRM backend | `http://127.0.0.1:8000` |
//! | `CRM_DATA_DIR` | Directory holding the credential database (`session.redb`) | `.crm-session` |
//! | `CRM_HTTP_TIMEOUT_SECS` | Per-request timeout in seconds | none (transport default) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Environment variable name for the backend base URL.
pub const API_BASE_URL_ENV: &str = "CRM_API_BASE_URL";

/// Environment variable name for the credential database directory.
pub const DATA_DIR_ENV: &str = "CRM_DATA_DIR";

/// Environment variable name for the per-request timeout.
///
/// Unset means requests wait as long as the transport allows.
pub const HTTP_TIMEOUT_ENV: &str = "CRM_HTTP_TIMEOUT_SECS";

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_DATA_DIR: &str = ".crm-session";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid http(s) URL: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("{name} must be a positive number of seconds, got {value}")]
    InvalidTimeout { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub http_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_base_url = validate_base_url(
            API_BASE_URL_ENV,
            &var(API_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        )?;
        let data_dir = PathBuf::from(
            var(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );
        let http_timeout = var(HTTP_TIMEOUT_ENV)
            .map(|value| parse_timeout(HTTP_TIMEOUT_ENV, &value))
            .transpose()?;

        Ok(Self {
            api_base_url,
            data_dir,
            http_timeout,
        })
    }

    /// Defaults with a fixed base URL.
    pub fn for_base_url(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            http_timeout: None,
        }
    }
}

/// Checks the scheme and strips the trailing slash.
pub fn validate_base_url(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_timeout(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout {
            name,
            value: value.to_string(),
        }),
    }
}

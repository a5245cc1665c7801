// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Command-line interface of the `crm-session` binary.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::api::{CrmClient, LeadQuery};
use crate::auth::TokenClaims;
use crate::config::{self, ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::logging::LogFormat;

/// Session client for the CRM backend.
#[derive(Debug, Parser)]
#[command(name = "crm-session")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Backend base URL (overrides CRM_API_BASE_URL).
    #[arg(long, env = "CRM_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory holding the credential database (overrides CRM_DATA_DIR).
    #[arg(long, env = "CRM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "CRM_HTTP_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Log format.
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session.
    Login {
        #[arg(long, env = "CRM_EMAIL")]
        email: String,

        #[arg(long, env = "CRM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Revoke the session and clear stored credentials.
    Logout,

    /// Show what is stored locally, without contacting the backend.
    Status,

    /// Verify the stored session and print the current user.
    Whoami,

    /// List leads of the current user.
    Leads {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        per_page: Option<u32>,

        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Locally stored session summary printed by `status`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LocalStatus {
    pub access_token_stored: bool,
    pub refresh_token_stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

impl Cli {
    /// Environment config with flag overrides applied.
    pub fn config(&self) -> Result<ClientConfig, CliError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(base_url) = &self.base_url {
            config.api_base_url = config::validate_base_url("--base-url", base_url)?;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(secs) = self.timeout_secs.filter(|secs| *secs > 0) {
            config.http_timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config()?;
    let crm = CrmClient::open(&config)?;
    info!(base_url = %config.api_base_url, "Using backend");

    match cli.command {
        Command::Login { email, password } => {
            let user = crm.session().login(&email, &password).await?;
            print_json(&user)
        }
        Command::Logout => {
            crm.session().logout().await?;
            print_json(&serde_json::json!({ "logged_out": true }))
        }
        Command::Status => print_json(&local_status(&crm)?),
        Command::Whoami => match crm.session().restore().await? {
            Some(user) => print_json(&user),
            None => Err(CliError::NotLoggedIn),
        },
        Command::Leads {
            page,
            per_page,
            search,
        } => {
            let query = LeadQuery {
                page,
                per_page,
                search,
                ..Default::default()
            };
            let leads = crm.leads().list(&query).await?;
            print_json(&leads)
        }
    }
}

pub fn local_status(crm: &CrmClient) -> Result<LocalStatus, CliError> {
    let access_token = crm.state().access_token()?;
    let refresh_token = crm.state().refresh_token()?;
    let claims = access_token.as_deref().and_then(TokenClaims::peek);

    Ok(LocalStatus {
        access_token_stored: access_token.is_some(),
        refresh_token_stored: refresh_token.is_some(),
        subject: claims.as_ref().and_then(|c| c.sub.clone()),
        expires_at: claims
            .as_ref()
            .and_then(TokenClaims::expires_at)
            .map(|at| at.to_rfc3339()),
        expired: claims.as_ref().map(TokenClaims::is_expired),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

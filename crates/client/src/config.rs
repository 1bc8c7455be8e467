// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::credential::storage;

/// Command-line client for the time tracking API.
#[derive(Debug, Parser)]
#[command(name = "tracker", version, about)]
pub struct Config {
    /// Base URL of the API (the auth service lives under `/auth`).
    #[arg(long, env = "TRACKER_API_URL", default_value = "http://localhost:5000/api")]
    pub api_url: String,

    /// Directory of the persistent credential area.
    #[arg(long, env = "TRACKER_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Directory of the session-scoped credential area.
    #[arg(long, env = "TRACKER_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "TRACKER_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TRACKER_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Timeout for each API request, in milliseconds.
    #[arg(long, env = "TRACKER_REQUEST_TIMEOUT_MS", default_value = "15000")]
    pub request_timeout_ms: u64,

    /// Timeout for a credential refresh, in milliseconds (0 = unbounded).
    #[arg(long, env = "TRACKER_REFRESH_TIMEOUT_MS", default_value = "30000")]
    pub refresh_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Log in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRACKER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Keep the credentials after this login session ends.
        #[arg(long)]
        remember: bool,
    },
    /// Revoke and forget the stored credentials.
    Logout,
    /// Print the identity of the stored credential.
    Whoami,
    /// Print where the credential is stored and whether it is usable.
    Status,
    /// GET an API path.
    Get { path: String },
    /// DELETE an API path.
    Delete { path: String },
    /// POST a JSON body to an API path.
    Post {
        path: String,
        #[arg(long)]
        data: Option<String>,
    },
    /// PUT a JSON body to an API path.
    Put {
        path: String,
        #[arg(long)]
        data: Option<String>,
    },
}

/// Everything a [`Session`](crate::session::Session) needs to reach the API.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_url: String,
    pub request_timeout: Duration,
    /// `None` leaves refreshes unbounded.
    pub refresh_timeout: Option<Duration>,
}

impl ClientSettings {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            request_timeout: Duration::from_secs(15),
            refresh_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| anyhow::anyhow!("invalid --api-url {:?}: {e}", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("--api-url must be http or https, got {}", url.scheme());
        }

        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {}", self.log_format);
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be positive");
        }

        if let Command::Post { data: Some(ref data), .. } | Command::Put { data: Some(ref data), .. } =
            self.command
        {
            serde_json::from_str::<serde_json::Value>(data)
                .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {e}"))?;
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_url: self.api_url.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            refresh_timeout: match self.refresh_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    /// Persistent area directory: flag, then the environment defaults.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(storage::state_dir)
    }

    /// Session area directory; `None` keeps the area in memory.
    pub fn session_dir(&self) -> Option<PathBuf> {
        self.session_dir.clone().or_else(storage::session_dir)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

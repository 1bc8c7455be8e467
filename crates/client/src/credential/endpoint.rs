// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire contract of the external auth service.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::TokenGrant;
use crate::error::{ApiError, RefreshRejected};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const REVOKE_PATH: &str = "/auth/revoke-token";

/// Paths that never carry, refresh, or retry a credential.
pub const EXEMPT_PATHS: [&str; 2] = [LOGIN_PATH, REFRESH_PATH];

/// Shown when a rejected login carries no message of its own.
pub const DEFAULT_LOGIN_ERROR: &str = "Invalid credentials";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Error body the auth service sends with a rejection.
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Thin client for `/auth/login`, `/auth/refresh-token`, `/auth/revoke-token`.
#[derive(Clone)]
pub struct AuthEndpoint {
    base_url: String,
    http: reqwest::Client,
}

impl AuthEndpoint {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_owned(), http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange email and password for a grant.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError> {
        let resp = self
            .http
            .post(self.url(LOGIN_PATH))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(ApiError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<MessageBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_LOGIN_ERROR.to_owned());
            debug!(status = status.as_u16(), "login rejected");
            return Err(ApiError::Http { status: status.as_u16(), message });
        }

        resp.json::<TokenGrant>().await.map_err(|e| ApiError::Body(e.to_string()))
    }

    /// Exchange a refresh credential for a new grant. No retries: a failed
    /// refresh ends the session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshRejected> {
        let resp = self
            .http
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RefreshRejected::Timeout
                } else {
                    RefreshRejected::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RefreshRejected::Status { status: status.as_u16(), body });
        }

        let grant: TokenGrant =
            resp.json().await.map_err(|e| RefreshRejected::Malformed(e.to_string()))?;
        if grant.access_token.is_empty() {
            return Err(RefreshRejected::Malformed("empty accessToken".to_owned()));
        }
        Ok(grant)
    }

    /// Whether `url` is exactly the login or refresh call under this base
    /// URL. Those never carry, refresh, or retry a credential. The query
    /// string and a trailing slash are ignored.
    pub fn is_exempt(&self, url: &reqwest::Url) -> bool {
        EXEMPT_PATHS.iter().any(|path| {
            reqwest::Url::parse(&self.url(path)).is_ok_and(|exempt| same_endpoint(&exempt, url))
        })
    }

    /// Revoke a refresh credential. Callers treat failure as best-effort.
    pub async fn revoke(&self, refresh_token: &str, access_token: &str) -> anyhow::Result<()> {
        self.http
            .post(self.url(REVOKE_PATH))
            .bearer_auth(access_token)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn same_endpoint(a: &reqwest::Url, b: &reqwest::Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
        && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;

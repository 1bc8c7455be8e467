// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login lifecycle and the identity of the current user.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::ClientSettings;
use crate::coordinator::RefreshCoordinator;
use crate::credential::claims::{self, Identity};
use crate::credential::endpoint::AuthEndpoint;
use crate::credential::refresh::RefreshClient;
use crate::credential::store::CredentialStore;
use crate::credential::CredentialPair;
use crate::error::{ApiError, DecodeError};
use crate::transport::{build_http_client, ApiClient, AuthLayer};

/// Lifecycle notifications for whoever presents the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(Identity),
    Refreshed(Identity),
    /// Credentials were cleared because they could not be renewed. The user
    /// has to log in again.
    Ended { reason: String },
    LoggedOut,
}

/// Stored-credential summary for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub persistent: bool,
    pub expires_at: DateTime<Utc>,
    pub usable: bool,
    pub has_refresh_token: bool,
}

/// Owns the credential store and the authenticated client built on it.
pub struct Session {
    store: Arc<CredentialStore>,
    endpoint: AuthEndpoint,
    api: ApiClient,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(settings: &ClientSettings, store: Arc<CredentialStore>) -> anyhow::Result<Self> {
        let http = build_http_client(settings.request_timeout)?;
        let (events, _) = broadcast::channel(64);

        let endpoint = AuthEndpoint::new(settings.api_url.clone(), http.clone());
        let refresher = RefreshClient::new(endpoint.clone(), Arc::clone(&store), events.clone())
            .with_timeout(settings.refresh_timeout);
        let auth = Arc::new(AuthLayer::new(
            Arc::clone(&store),
            Arc::new(RefreshCoordinator::new()),
            refresher,
            events.clone(),
        ));
        let api = ApiClient::new(http, settings.api_url.clone(), auth);

        Ok(Self { store, endpoint, api, events })
    }

    /// The authenticated client for domain calls.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Store `pair` as the current credential and announce the identity it
    /// carries. The pair is kept even if it does not decode; the next call
    /// refreshes it.
    pub fn login(&self, pair: &CredentialPair) -> Result<Identity, DecodeError> {
        self.store.write(pair);
        let identity = claims::decode_identity(&pair.access_token)?;
        info!(id = ?identity.id, role = ?identity.role, persistent = pair.persistent, "logged in");
        let _ = self.events.send(SessionEvent::LoggedIn(identity.clone()));
        Ok(identity)
    }

    /// Log in through the auth service. The server's persistence flag wins
    /// over `remember` when it sends one.
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Identity, ApiError> {
        let pair = self.endpoint.login(email, password).await?.into_pair(remember);
        self.login(&pair).map_err(|e| ApiError::Body(e.to_string()))
    }

    /// Revoke the refresh credential (best-effort) and clear the store.
    /// Safe to call with nothing stored.
    ///
    /// A refresh still in flight cannot bring the session back: its grant
    /// is discarded once it finds the store changed.
    pub async fn logout(&self) {
        let revoked = match self.store.read() {
            Some(pair) => {
                self.revoke(&pair).await;
                pair.refresh_token
            }
            None => None,
        };
        // A refresh may have landed while the revoke was in flight.
        if let Some(landed) = self.store.take() {
            if landed.refresh_token.is_some() && landed.refresh_token != revoked {
                self.revoke(&landed).await;
            }
        }
        info!("logged out");
        let _ = self.events.send(SessionEvent::LoggedOut);
    }

    async fn revoke(&self, pair: &CredentialPair) {
        let Some(ref refresh) = pair.refresh_token else {
            return;
        };
        if let Err(e) = self.endpoint.revoke(refresh, &pair.access_token).await {
            warn!("revoke failed, clearing locally: {e:#}");
        }
    }

    /// Identity of the stored access credential, if it decodes.
    pub fn identity(&self) -> Option<Identity> {
        let pair = self.store.read()?;
        claims::decode_identity(&pair.access_token).ok()
    }

    /// Startup check: drop a stored access credential that does not decode.
    /// An expired but decodable one is kept for the next call to refresh.
    pub fn restore(&self) -> Option<Identity> {
        let pair = self.store.read()?;
        match claims::decode_identity(&pair.access_token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("discarding stored credential: {e}");
                self.store.clear();
                None
            }
        }
    }

    /// Require a logged-in identity whose role is in `allowed`. An empty
    /// list admits any logged-in identity.
    pub fn require_role(&self, allowed: &[&str]) -> Result<Identity, ApiError> {
        let identity = self.identity().ok_or(ApiError::Unauthenticated)?;
        if allowed.is_empty() {
            return Ok(identity);
        }
        match identity.role.as_deref() {
            Some(role) if allowed.contains(&role) => Ok(identity),
            role => Err(ApiError::Unauthorized { role: role.map(str::to_owned) }),
        }
    }

    /// Summary of the stored credential.
    pub fn status(&self) -> Option<CredentialStatus> {
        let pair = self.store.read()?;
        Some(CredentialStatus {
            persistent: pair.persistent,
            expires_at: pair.expires_at,
            usable: pair.is_usable(Utc::now()),
            has_refresh_token: pair.refresh_token.is_some(),
        })
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::coordinator::RefreshResult;
use crate::credential::claims;
use crate::credential::endpoint::AuthEndpoint;
use crate::credential::store::CredentialStore;
use crate::credential::CredentialPair;
use crate::error::RefreshRejected;
use crate::session::SessionEvent;

/// Default bound on one refresh round trip.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchanges the stored refresh credential for a new pair.
pub struct RefreshClient {
    endpoint: AuthEndpoint,
    store: Arc<CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
    timeout: Option<Duration>,
}

impl RefreshClient {
    pub fn new(
        endpoint: AuthEndpoint,
        store: Arc<CredentialStore>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { endpoint, store, events, timeout: Some(DEFAULT_REFRESH_TIMEOUT) }
    }

    /// `None` disables the bound.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &AuthEndpoint {
        &self.endpoint
    }

    /// Exchange the refresh credential of `current` for a new pair and store
    /// it in place of `current`. The store is left untouched on failure.
    ///
    /// If `current` is no longer stored when the grant arrives (logout, or a
    /// new login) the grant is revoked and dropped.
    pub async fn refresh(
        &self,
        current: &CredentialPair,
    ) -> Result<CredentialPair, RefreshRejected> {
        let refresh_token =
            current.refresh_token.as_deref().ok_or(RefreshRejected::MissingRefreshToken)?;
        let call = self.endpoint.refresh(refresh_token);
        let grant = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RefreshRejected::Timeout)??,
            None => call.await?,
        };

        let pair = grant.into_pair(current.persistent);
        if !self.store.replace_if(&current.access_token, &pair) {
            info!("credentials changed during refresh, discarding new pair");
            self.discard(&pair).await;
            return Err(RefreshRejected::Superseded);
        }
        info!(expires_at = %pair.expires_at, persistent = pair.persistent, "credentials refreshed");

        match claims::decode_identity(&pair.access_token) {
            Ok(identity) => {
                let _ = self.events.send(SessionEvent::Refreshed(identity));
            }
            Err(e) => warn!("refreshed access credential does not decode: {e}"),
        }
        Ok(pair)
    }

    /// Refresh on behalf of a caller that saw `stale` as the current access
    /// credential. If the store already holds a different usable credential
    /// it is returned without a network call.
    pub async fn refresh_stale(&self, stale: Option<&str>) -> RefreshResult {
        let current = self.store.read().ok_or(RefreshRejected::MissingRefreshToken)?;
        if stale != Some(current.access_token.as_str()) && current.is_usable(Utc::now()) {
            debug!("credential already replaced, skipping refresh");
            return Ok(current.access_token);
        }

        match self.refresh(&current).await {
            Ok(pair) => Ok(pair.access_token),
            Err(RefreshRejected::Superseded) => match self.store.read() {
                Some(pair) if pair.is_usable(Utc::now()) => Ok(pair.access_token),
                _ => Err(RefreshRejected::Superseded),
            },
            Err(e) => Err(e),
        }
    }

    async fn discard(&self, pair: &CredentialPair) {
        let Some(ref refresh) = pair.refresh_token else {
            return;
        };
        if let Err(e) = self.endpoint.revoke(refresh, &pair.access_token).await {
            debug!("revoking discarded credentials failed: {e:#}");
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;

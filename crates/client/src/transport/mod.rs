// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated HTTP transport.
//!
//! [`ApiClient`] sends domain calls through an [`AuthLayer`], which attaches
//! the current access credential before sending ([`request`]) and recovers
//! from a rejected one after the response arrives ([`response`]). Both sides
//! share one [`RefreshCoordinator`], so concurrent calls never start more
//! than one refresh.

pub mod request;
pub mod response;

pub use response::{Attempt, Verdict};

use std::sync::{Arc, Once};
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::coordinator::{RefreshCoordinator, Role};
use crate::credential::endpoint::MessageBody;
use crate::credential::refresh::RefreshClient;
use crate::credential::store::CredentialStore;
use crate::error::{ApiError, RefreshRejected};
use crate::session::SessionEvent;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for rustls.
///
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the HTTP client every request of this crate goes through.
pub fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    ensure_crypto();
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Attach `token` as the bearer credential, replacing any previous one.
pub fn attach(request: &mut reqwest::Request, token: &str) -> Result<(), ApiError> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ApiError::Body(format!("access credential is not a header value: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// State shared by the request and response interceptors.
pub struct AuthLayer {
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    refresher: RefreshClient,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthLayer {
    pub fn new(
        store: Arc<CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
        refresher: RefreshClient,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { store, coordinator, refresher, events }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Join the refresh episode for a caller that saw `stale`. On failure the
    /// leader ends the session; every participant gets `Unauthenticated`.
    pub(crate) async fn refresh_or_end(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let outcome = self.coordinator.refresh(|| self.refresher.refresh_stale(stale)).await;
        match outcome.result {
            Ok(token) => Ok(token),
            Err(e) => {
                match (outcome.role, &e) {
                    // Logout or a new login already decided what the store holds.
                    (_, RefreshRejected::Superseded) => {
                        debug!("credentials replaced during refresh")
                    }
                    (Role::Leader, _) => self.end_session(e.to_string()),
                    (Role::Follower, _) => debug!(code = e.as_str(), "shared refresh failed"),
                }
                Err(ApiError::Unauthenticated)
            }
        }
    }

    /// Whether `url` is one of the auth service calls that bypass both
    /// interceptors.
    pub fn is_exempt(&self, url: &reqwest::Url) -> bool {
        self.refresher.endpoint().is_exempt(url)
    }

    /// Clear every credential and announce that the session is over.
    pub(crate) fn end_session(&self, reason: String) {
        self.store.clear();
        warn!(reason = %reason, "session ended");
        let _ = self.events.send(SessionEvent::Ended { reason });
    }
}

/// HTTP client for domain calls against the API base URL.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthLayer>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, auth: Arc<AuthLayer>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_owned(), auth }
    }

    pub fn auth(&self) -> &Arc<AuthLayer> {
        &self.auth
    }

    /// Absolute URL for `path`; absolute inputs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Build and [`execute`](Self::execute) a request.
    pub async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = builder.build().map_err(|e| ApiError::Body(e.to_string()))?;
        self.execute(request).await
    }

    /// Send `request` through the interceptors. Non-2xx responses become
    /// [`ApiError::Http`].
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, ApiError> {
        if self.auth.is_exempt(request.url()) {
            let resp = self.http.execute(request).await.map_err(ApiError::transport)?;
            return into_result(resp).await;
        }

        let mut request = request;
        let mut token = self.auth.before_send(&mut request).await?;
        let mut retried = false;
        loop {
            let replay = if retried { None } else { request.try_clone() };
            let attempt = Attempt { token: token.clone(), retried, replayable: replay.is_some() };
            let resp = self.http.execute(request).await.map_err(ApiError::transport)?;

            match self.auth.after_response(resp, &attempt).await? {
                Verdict::Done(resp) => return into_result(resp).await,
                Verdict::Retry(fresh) => {
                    let Some(mut next) = replay else {
                        return Err(ApiError::Unauthenticated);
                    };
                    attach(&mut next, &fresh)?;
                    request = next;
                    token = Some(fresh);
                    retried = true;
                }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        read_json(self.send(self.request(Method::GET, path)).await?).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        read_json(self.send(self.request(Method::POST, path).json(body)).await?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        read_json(self.send(self.request(Method::PUT, path).json(body)).await?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        read_json(self.send(self.request(Method::DELETE, path)).await?).await
    }
}

/// Pass 2xx through; turn anything else into [`ApiError::Http`].
pub async fn into_result(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(http_error(resp).await)
}

/// Build an [`ApiError::Http`] from a non-2xx response, preferring the
/// server's `{message}`.
pub(crate) async fn http_error(resp: reqwest::Response) -> ApiError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&text)
        .ok()
        .and_then(|b| b.message)
        .or_else(|| Some(text.trim().to_owned()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
    ApiError::Http { status: status.as_u16(), message }
}

/// Decode a JSON body; an empty body decodes as `null`.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let bytes = resp.bytes().await.map_err(ApiError::transport)?;
    let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    serde_json::from_slice(bytes).map_err(|e| ApiError::Body(e.to_string()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

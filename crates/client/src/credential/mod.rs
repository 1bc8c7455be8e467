// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential storage, claim decoding, and the refresh client.
//!
//! The current [`CredentialPair`] lives in a [`store::CredentialStore`] backed
//! by two lifetime-scoped storage areas. [`refresh::RefreshClient`] exchanges
//! the refresh credential for a new pair through the auth service and writes
//! it back into the store.

pub mod claims;
pub mod endpoint;
pub mod refresh;
pub mod storage;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::claims::Claims;
use crate::error::DecodeError;

/// The current access/refresh credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    /// `None` when the auth service issued no refresh credential.
    pub refresh_token: Option<String>,
    /// Advisory: the server may reject the access credential earlier.
    pub expires_at: DateTime<Utc>,
    /// Selects the durable area over the session-scoped one.
    pub persistent: bool,
}

/// Why a stored access credential cannot be attached as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unusable {
    Undecodable(DecodeError),
    Expired,
}

impl CredentialPair {
    /// Decode the access credential and check both the stored expiry and the
    /// embedded `exp` claim against `now`. An instant at or before `now` is
    /// expired.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<Claims, Unusable> {
        let claims = claims::decode(&self.access_token).map_err(Unusable::Undecodable)?;
        if self.expires_at <= now {
            return Err(Unusable::Expired);
        }
        if claims.expires_at.is_some_and(|exp| exp <= now) {
            return Err(Unusable::Expired);
        }
        Ok(claims)
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.check_usable(now).is_ok()
    }
}

/// Credential grant returned by `/auth/login` and `/auth/refresh-token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_persistent: Option<bool>,
}

impl TokenGrant {
    /// Convert to a pair. The server's `isPersistent` wins over `fallback`.
    pub fn into_pair(self, fallback_persistent: bool) -> CredentialPair {
        CredentialPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_at: self.expires_at,
            persistent: self.is_persistent.unwrap_or(fallback_persistent),
        }
    }
}

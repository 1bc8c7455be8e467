// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decoding the identity embedded in an access credential.
//!
//! The signature is not verified here; the server is authoritative. Claims
//! are only read to show who is logged in and to detect expiry early.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;

const NAME_IDENTIFIER_URI: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
const NAME_URI: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
const EMAIL_URI: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";
const ROLE_URI: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Who the access credential says we are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Decoded claims of an access credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub identity: Identity,
    /// The `exp` claim, when present.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(DecodeError("expected three dot-separated segments".to_owned()));
    };

    // Some issuers keep the padding; the URL-safe alphabet is mandatory.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DecodeError(format!("payload is not base64url: {e}")))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| DecodeError(format!("payload is not JSON: {e}")))?;
    let Value::Object(map) = value else {
        return Err(DecodeError("payload is not a JSON object".to_owned()));
    };

    let expires_at = match map.get("exp") {
        None | Some(Value::Null) => None,
        Some(exp) => {
            let secs = exp
                .as_i64()
                .or_else(|| exp.as_f64().map(|f| f as i64))
                .ok_or_else(|| DecodeError("exp claim is not numeric".to_owned()))?;
            Some(
                DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| DecodeError(format!("exp claim out of range: {secs}")))?,
            )
        }
    };

    Ok(Claims { identity: normalize(&map), expires_at })
}

/// Decode only the identity.
pub fn decode_identity(token: &str) -> Result<Identity, DecodeError> {
    decode(token).map(|c| c.identity)
}

fn normalize(map: &Map<String, Value>) -> Identity {
    Identity {
        id: first_claim(map, &["nameid", NAME_IDENTIFIER_URI, "sub"]),
        name: first_claim(map, &["name", NAME_URI]),
        email: first_claim(map, &["email", EMAIL_URI]),
        role: first_claim(map, &["role", ROLE_URI]),
    }
}

fn first_claim(map: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| map.get(*name).and_then(claim_string))
}

fn claim_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        // Multi-valued claims (e.g. several roles) keep the first entry.
        Value::Array(items) => items.iter().find_map(claim_string),
        _ => None,
    }
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;

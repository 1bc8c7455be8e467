// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// The stored access credential could not be parsed as a signed token.
///
/// Never surfaced to API callers: an undecodable credential is treated
/// exactly like an expired one and triggers a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed access credential: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

/// Why a credential refresh did not produce a new pair.
///
/// `Clone` because one failure is broadcast to every caller waiting on the
/// same refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshRejected {
    /// No refresh credential is stored; nothing was sent.
    MissingRefreshToken,
    /// The auth service answered with a non-2xx status.
    Status { status: u16, body: String },
    /// The request never completed (connect, TLS, body read).
    Transport(String),
    /// The auth service answered 2xx with a body we could not use.
    Malformed(String),
    /// The refresh exceeded the configured timeout.
    Timeout,
    /// The caller driving the refresh went away before it settled.
    Abandoned,
    /// The stored pair was cleared or replaced while the refresh was in
    /// flight. The new pair was discarded.
    Superseded,
}

impl RefreshRejected {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            Self::Status { .. } => "REFRESH_STATUS",
            Self::Transport(_) => "REFRESH_TRANSPORT",
            Self::Malformed(_) => "REFRESH_MALFORMED",
            Self::Timeout => "REFRESH_TIMEOUT",
            Self::Abandoned => "REFRESH_ABANDONED",
            Self::Superseded => "REFRESH_SUPERSEDED",
        }
    }
}

impl fmt::Display for RefreshRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRefreshToken => f.write_str("no refresh credential stored"),
            Self::Status { status, body } => write!(f, "refresh rejected ({status}): {body}"),
            Self::Transport(e) => write!(f, "refresh request failed: {e}"),
            Self::Malformed(e) => write!(f, "refresh response unusable: {e}"),
            Self::Timeout => f.write_str("refresh timed out"),
            Self::Abandoned => f.write_str("refresh abandoned before it settled"),
            Self::Superseded => f.write_str("credentials changed while refreshing"),
        }
    }
}

impl std::error::Error for RefreshRejected {}

/// Errors returned to callers of the authenticated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No valid credential can be obtained. The session has ended.
    Unauthenticated,
    /// A valid identity whose role is not allowed for the operation.
    Unauthorized { role: Option<String> },
    /// The server answered with a non-2xx status, passed through untouched.
    Http { status: u16, message: String },
    /// The request never completed.
    Transport(String),
    /// The request or response body could not be built or read.
    Body(String),
}

impl ApiError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated => Some(401),
            Self::Unauthorized { .. } => Some(403),
            Self::Http { status, .. } => Some(*status),
            Self::Transport(_) | Self::Body(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Http { .. } => "HTTP",
            Self::Transport(_) => "TRANSPORT",
            Self::Body(_) => "BODY",
        }
    }

    pub(crate) fn transport(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("not authenticated, please log in again"),
            Self::Unauthorized { role: Some(role) } => write!(f, "role {role:?} is not allowed"),
            Self::Unauthorized { role: None } => f.write_str("no role is assigned"),
            Self::Http { status, message } => write!(f, "request failed ({status}): {message}"),
            Self::Transport(e) => write!(f, "request failed: {e}"),
            Self::Body(e) => write!(f, "invalid body: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<RefreshRejected> for ApiError {
    fn from(_: RefreshRejected) -> Self {
        Self::Unauthenticated
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{http_error, AuthLayer};
use crate::error::ApiError;

/// What was sent for one attempt of a call.
#[derive(Debug, Clone, Default)]
pub struct Attempt {
    /// Access credential attached to the attempt.
    pub token: Option<String>,
    /// This attempt is already the single retry.
    pub retried: bool,
    /// A copy of the request exists to re-send.
    pub replayable: bool,
}

/// Decision for a completed response.
#[derive(Debug)]
pub enum Verdict {
    /// Hand the response to the caller.
    Done(reqwest::Response),
    /// Re-send the call once with this access credential.
    Retry(String),
}

impl AuthLayer {
    /// Inspect a response to a non-exempt call.
    ///
    /// A 401 on the first attempt refreshes and asks for one retry. A 401 on
    /// the retry ends the session and surfaces as [`ApiError::Http`]. A 401
    /// on a request that cannot be re-sent still drives the refresh, then
    /// surfaces as [`ApiError::Http`].
    pub async fn after_response(
        &self,
        response: reqwest::Response,
        attempt: &Attempt,
    ) -> Result<Verdict, ApiError> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(Verdict::Done(response));
        }

        if attempt.retried {
            let err = http_error(response).await;
            self.end_session("credential rejected after refresh".to_owned());
            return Err(err);
        }

        if !attempt.replayable {
            warn!(url = %response.url(), "401 on a request that cannot be replayed");
            let err = http_error(response).await;
            self.refresh_or_end(attempt.token.as_deref()).await?;
            return Err(err);
        }

        debug!(url = %response.url(), "401, refreshing before retry");
        let token = self.refresh_or_end(attempt.token.as_deref()).await?;
        Ok(Verdict::Retry(token))
    }
}

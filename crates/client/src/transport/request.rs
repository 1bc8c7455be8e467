// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;
use tracing::debug;

use super::{attach, AuthLayer};
use crate::credential::Unusable;
use crate::error::ApiError;

impl AuthLayer {
    /// Attach a usable access credential to `request`, refreshing first when
    /// the stored one is expired or undecodable.
    ///
    /// Returns the credential that was attached, if any. Exempt auth calls
    /// and calls made with nothing stored go out without one. When the
    /// refresh fails the call is not sent.
    pub async fn before_send(&self, request: &mut reqwest::Request) -> Result<Option<String>, ApiError> {
        if self.is_exempt(request.url()) {
            return Ok(None);
        }

        let Some(pair) = self.store().read() else {
            debug!(url = %request.url(), "no stored credential, sending anonymously");
            return Ok(None);
        };

        let token = match pair.check_usable(Utc::now()) {
            Ok(_) => pair.access_token,
            Err(why) => {
                match why {
                    Unusable::Expired => debug!("access credential expired"),
                    Unusable::Undecodable(e) => debug!("access credential unusable: {e}"),
                }
                self.refresh_or_end(Some(&pair.access_token)).await?
            }
        };

        attach(request, &token)?;
        Ok(Some(token))
    }
}

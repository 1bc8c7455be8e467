// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide credential store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::credential::storage::{FileArea, MemoryArea, StorageArea};
use crate::credential::CredentialPair;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const EXPIRES_AT_KEY: &str = "expires_at";
pub const PERSISTENT_KEY: &str = "persistent";

/// Every key the store owns, in either area.
pub const KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY, PERSISTENT_KEY];

/// Holds at most one current [`CredentialPair`] in exactly one of two areas.
///
/// `write` clears the other area and replaces the selected one in a single
/// update, so a reader never has to merge them. All operations hold one lock
/// for their full duration; no caller observes a half-written pair.
pub struct CredentialStore {
    persistent: Box<dyn StorageArea>,
    session: Box<dyn StorageArea>,
    lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(persistent: Box<dyn StorageArea>, session: Box<dyn StorageArea>) -> Self {
        Self { persistent, session, lock: Mutex::new(()) }
    }

    /// Both areas in memory.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self::new(Box::new(MemoryArea::new()), Box::new(MemoryArea::new())))
    }

    /// Persistent area under `state_dir`; session area under `session_dir`,
    /// or in memory when there is none.
    pub fn open(state_dir: &std::path::Path, session_dir: Option<&std::path::Path>) -> Arc<Self> {
        let session: Box<dyn StorageArea> = match session_dir {
            Some(dir) => Box::new(FileArea::in_dir(dir)),
            None => Box::new(MemoryArea::new()),
        };
        Arc::new(Self::new(Box::new(FileArea::in_dir(state_dir)), session))
    }

    pub fn persistent_area(&self) -> &dyn StorageArea {
        self.persistent.as_ref()
    }

    pub fn session_area(&self) -> &dyn StorageArea {
        self.session.as_ref()
    }

    /// Read the current pair, if any.
    pub fn read(&self) -> Option<CredentialPair> {
        let _guard = self.lock.lock();
        self.current()
    }

    /// Replace the current pair.
    pub fn write(&self, pair: &CredentialPair) {
        let _guard = self.lock.lock();
        self.put(pair);
    }

    /// Replace the current pair only if its access credential is still
    /// `expected`. Returns whether `pair` was written.
    pub fn replace_if(&self, expected: &str, pair: &CredentialPair) -> bool {
        let _guard = self.lock.lock();
        match self.current() {
            Some(current) if current.access_token == expected => {
                self.put(pair);
                true
            }
            _ => false,
        }
    }

    /// Remove every credential key from both areas.
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        self.persistent.remove_all(&KEYS);
        self.session.remove_all(&KEYS);
        debug!("credentials cleared");
    }

    /// Clear the store, returning the pair it held.
    pub fn take(&self) -> Option<CredentialPair> {
        let _guard = self.lock.lock();
        let current = self.current();
        self.persistent.remove_all(&KEYS);
        self.session.remove_all(&KEYS);
        debug!(held = current.is_some(), "credentials taken");
        current
    }

    fn current(&self) -> Option<CredentialPair> {
        read_area(self.persistent.as_ref()).or_else(|| read_area(self.session.as_ref()))
    }

    fn put(&self, pair: &CredentialPair) {
        let (area, other) = if pair.persistent {
            (&self.persistent, &self.session)
        } else {
            (&self.session, &self.persistent)
        };
        other.remove_all(&KEYS);

        let mut entries = BTreeMap::new();
        entries.insert(ACCESS_TOKEN_KEY.to_owned(), pair.access_token.clone());
        if let Some(ref refresh) = pair.refresh_token {
            entries.insert(REFRESH_TOKEN_KEY.to_owned(), refresh.clone());
        }
        entries.insert(
            EXPIRES_AT_KEY.to_owned(),
            pair.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        entries.insert(PERSISTENT_KEY.to_owned(), pair.persistent.to_string());
        area.replace(&KEYS, &entries);
        debug!(area = %area.describe(), expires_at = %pair.expires_at, "credentials written");
    }
}

fn read_area(area: &dyn StorageArea) -> Option<CredentialPair> {
    let access_token = area.get(ACCESS_TOKEN_KEY)?;
    let expires_at = area.get(EXPIRES_AT_KEY)?;
    let persistent = area.get(PERSISTENT_KEY)?;

    let expires_at = match DateTime::parse_from_rfc3339(&expires_at) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            warn!(area = %area.describe(), "ignoring credentials with bad expiry: {e}");
            return None;
        }
    };
    let persistent = match persistent.as_str() {
        "true" => true,
        "false" => false,
        other => {
            warn!(area = %area.describe(), value = other, "ignoring credentials with bad flag");
            return None;
        }
    };

    Some(CredentialPair {
        access_token,
        refresh_token: area.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty()),
        expires_at,
        persistent,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifetime-scoped key/value storage areas backing the credential store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

/// A string key/value area. Mutations are synchronous and complete before
/// returning.
pub trait StorageArea: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    /// Remove every key in `keys`.
    fn remove_all(&self, keys: &[&str]) {
        for key in keys {
            self.remove(key);
        }
    }

    /// Remove every key in `keys`, then insert `entries`, as one update.
    fn replace(&self, keys: &[&str], entries: &BTreeMap<String, String>) {
        self.remove_all(keys);
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Human-readable location, for logs and `tracker status`.
    fn describe(&self) -> String;
}

/// Process-lifetime storage. Gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryArea {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageArea for MemoryArea {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn replace(&self, keys: &[&str], entries: &BTreeMap<String, String>) {
        let mut current = self.entries.lock();
        current.retain(|k, _| !keys.contains(&k.as_str()));
        current.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn describe(&self) -> String {
        "memory".to_owned()
    }
}

/// Storage persisted as a JSON object of string values in one file.
///
/// Every mutation rewrites the whole file atomically (write tmp + rename).
/// I/O failures are logged and treated as an empty area.
#[derive(Debug)]
pub struct FileArea {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    io: Mutex<()>,
}

impl FileArea {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), io: Mutex::new(()) }
    }

    /// Area stored as `credentials.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read storage area: {e}");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), "failed to parse storage area: {e}");
                BTreeMap::new()
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) {
        if entries.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "storage area emptied"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %self.path.display(), "failed to remove storage area: {e}"),
            }
            return;
        }

        let json = match serde_json::to_string_pretty(entries) {
            Ok(j) => j,
            Err(e) => {
                warn!("failed to serialize storage area: {e}");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), "failed to create storage dir: {e}");
                return;
            }
        }
        let tmp = self.path.with_extension(format!("{}.tmp", std::process::id()));
        if let Err(e) = std::fs::write(&tmp, json) {
            warn!(path = %tmp.display(), "failed to write storage area: {e}");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), "failed to rename storage area: {e}");
        }
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) {
        let _io = self.io.lock();
        let mut entries = self.load();
        if f(&mut entries) {
            self.save(&entries);
        }
    }
}

impl StorageArea for FileArea {
    fn get(&self, key: &str) -> Option<String> {
        let _io = self.io.lock();
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
            true
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| entries.remove(key).is_some());
    }

    fn remove_all(&self, keys: &[&str]) {
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|k, _| !keys.contains(&k.as_str()));
            entries.len() != before
        });
    }

    fn replace(&self, keys: &[&str], entries: &BTreeMap<String, String>) {
        self.update(|current| {
            current.retain(|k, _| !keys.contains(&k.as_str()));
            current.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            true
        });
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Resolve the directory for the persistent area.
///
/// Checks `TRACKER_STATE_DIR`, then `$XDG_STATE_HOME/tracker`, then
/// `$HOME/.local/state/tracker`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRACKER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tracker");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/tracker");
    }
    PathBuf::from(".tracker")
}

/// Resolve the directory for the session-scoped area.
///
/// Checks `TRACKER_SESSION_DIR`, then `$XDG_RUNTIME_DIR/tracker`. `None`
/// means no login-session directory exists and the area lives in memory.
pub fn session_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("TRACKER_SESSION_DIR") {
        return Some(PathBuf::from(dir));
    }
    std::env::var("XDG_RUNTIME_DIR").ok().map(|dir| PathBuf::from(dir).join("tracker"))
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;

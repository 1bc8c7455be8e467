// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `tracker` binary as a subprocess against an in-process mock
//! of the auth service and domain API. Each [`TrackerCli`] gets its own
//! credential directories, so invocations share state only through them.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration as Delta, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use tracker::test_support::token_for;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "hunter2";

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the path to the compiled `tracker` binary.
pub fn tracker_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("tracker")
}

/// Captured result of one `tracker` invocation.
#[derive(Debug)]
pub struct Output {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn json(&self) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// `tracker` bound to one API and one pair of credential directories.
pub struct TrackerCli {
    api_url: String,
    state_dir: tempfile::TempDir,
    session_dir: tempfile::TempDir,
}

impl TrackerCli {
    pub fn new(api_url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_url: api_url.into(),
            state_dir: tempfile::tempdir()?,
            session_dir: tempfile::tempdir()?,
        })
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn session_dir(&self) -> &Path {
        self.session_dir.path()
    }

    /// Run `tracker <args>` to completion.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<Output> {
        let binary = tracker_binary();
        anyhow::ensure!(binary.exists(), "tracker binary not found at {}", binary.display());

        let child = tokio::process::Command::new(&binary)
            .args(args)
            .env("TRACKER_API_URL", &self.api_url)
            .env("TRACKER_STATE_DIR", self.state_dir.path())
            .env("TRACKER_SESSION_DIR", self.session_dir.path())
            .env("TRACKER_LOG_LEVEL", "warn")
            .env_remove("TRACKER_PASSWORD")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let out = tokio::time::timeout(RUN_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| anyhow::anyhow!("tracker {args:?} did not exit within {RUN_TIMEOUT:?}"))??;
        Ok(Output {
            code: out.status.code(),
            stdout: String::from_utf8(out.stdout)?,
            stderr: String::from_utf8(out.stderr)?,
        })
    }
}

/// Mock backend: password login, refresh, revoke, and a few domain routes
/// that require the most recently issued access credential.
pub struct Backend {
    pub addr: SocketAddr,
    pub refresh_calls: AtomicU32,
    pub revoke_calls: AtomicU32,
    /// Issue login credentials that are already expired.
    pub stale_logins: AtomicBool,
    issued: Mutex<Issued>,
}

#[derive(Default)]
struct Issued {
    serial: u32,
    access: Option<String>,
    refresh: Option<String>,
}

impl Backend {
    pub async fn start() -> anyhow::Result<Arc<Self>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let backend = Arc::new(Self {
            addr: listener.local_addr()?,
            refresh_calls: AtomicU32::new(0),
            revoke_calls: AtomicU32::new(0),
            stale_logins: AtomicBool::new(false),
            issued: Mutex::new(Issued::default()),
        });

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/refresh-token", post(refresh))
            .route("/api/auth/revoke-token", post(revoke))
            .route("/api/tasks", get(tasks).post(create_task))
            .with_state(Arc::clone(&backend));
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(backend)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> u32 {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    /// Issue a new pair and make it the only one accepted.
    fn issue(&self, expires_at: DateTime<Utc>) -> Value {
        let mut issued = self.issued.lock();
        issued.serial += 1;
        let access = token_for(&issued.serial.to_string(), EMAIL, "Admin", expires_at);
        let refresh = format!("R{}", issued.serial);
        issued.access = Some(access.clone());
        issued.refresh = Some(refresh.clone());

        json!({
            "accessToken": access,
            "refreshToken": refresh,
            "expiresAt": expires_at.to_rfc3339(),
        })
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let sent = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        let issued = self.issued.lock();
        match (sent, issued.access.as_deref()) {
            (Some(sent), Some(access)) => sent == format!("Bearer {access}"),
            _ => false,
        }
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    if body["email"] != EMAIL || body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid credentials" })))
            .into_response();
    }
    let expires_at = if backend.stale_logins.load(Ordering::SeqCst) {
        Utc::now() - Delta::minutes(1)
    } else {
        Utc::now() + Delta::hours(1)
    };
    Json(backend.issue(expires_at)).into_response()
}

async fn refresh(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let current = backend.issued.lock().refresh.clone();
    if current.is_none() || body["refreshToken"].as_str() != current.as_deref() {
        return unauthorized();
    }
    Json(backend.issue(Utc::now() + Delta::hours(1))).into_response()
}

async fn revoke(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.revoke_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    let mut issued = backend.issued.lock();
    issued.access = None;
    issued.refresh = None;
    StatusCode::NO_CONTENT.into_response()
}

async fn tasks(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([{ "id": 1, "title": "Write the weekly report" }])).into_response()
}

async fn create_task(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    (StatusCode::CREATED, Json(json!({ "id": 2, "title": body["title"] }))).into_response()
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `tracker` binary against a mock
//! backend.

use std::sync::atomic::Ordering;

use tracker_specs::{Backend, TrackerCli, EMAIL, PASSWORD};

/// Exit code for "log in again".
const UNAUTHENTICATED: Option<i32> = Some(3);

#[tokio::test]
async fn login_whoami_call_logout() -> anyhow::Result<()> {
    let backend = Backend::start().await?;
    let cli = TrackerCli::new(backend.api_url())?;

    let out = cli.run(&["login", "--email", EMAIL, "--password", PASSWORD, "--remember"]).await?;
    assert!(out.success(), "login failed: {out:?}");
    assert_eq!(out.json()?["email"], EMAIL);
    assert!(cli.state_dir().join("credentials.json").exists());

    let out = cli.run(&["whoami"]).await?;
    assert!(out.success(), "whoami failed: {out:?}");
    assert_eq!(out.json()?["role"], "Admin");

    let out = cli.run(&["get", "/tasks"]).await?;
    assert!(out.success(), "get failed: {out:?}");
    assert_eq!(out.json()?[0]["id"], 1);

    let out = cli.run(&["post", "/tasks", "--data", r#"{"title":"Review"}"#]).await?;
    assert!(out.success(), "post failed: {out:?}");
    assert_eq!(out.json()?["title"], "Review");

    let out = cli.run(&["logout"]).await?;
    assert!(out.success(), "logout failed: {out:?}");
    assert_eq!(backend.revoke_calls(), 1);
    assert!(!cli.state_dir().join("credentials.json").exists());

    let out = cli.run(&["whoami"]).await?;
    assert_eq!(out.code, UNAUTHENTICATED);
    Ok(())
}

#[tokio::test]
async fn login_without_remember_uses_session_area() -> anyhow::Result<()> {
    let backend = Backend::start().await?;
    let cli = TrackerCli::new(backend.api_url())?;

    let out = cli.run(&["login", "--email", EMAIL, "--password", PASSWORD]).await?;
    assert!(out.success(), "login failed: {out:?}");
    assert!(cli.session_dir().join("credentials.json").exists());
    assert!(!cli.state_dir().join("credentials.json").exists());

    let out = cli.run(&["status"]).await?;
    let status = out.json()?;
    assert_eq!(status["persistent"], false);
    assert_eq!(status["usable"], true);
    assert_eq!(status["hasRefreshToken"], true);
    Ok(())
}

#[tokio::test]
async fn wrong_password_reports_server_message() -> anyhow::Result<()> {
    let backend = Backend::start().await?;
    let cli = TrackerCli::new(backend.api_url())?;

    let out = cli.run(&["login", "--email", EMAIL, "--password", "wrong"]).await?;
    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("Invalid credentials"), "stderr: {}", out.stderr);

    let out = cli.run(&["status"]).await?;
    assert_eq!(out.stdout.trim(), "null");
    Ok(())
}

#[tokio::test]
async fn expired_login_is_refreshed_on_next_call() -> anyhow::Result<()> {
    let backend = Backend::start().await?;
    backend.stale_logins.store(true, Ordering::SeqCst);
    let cli = TrackerCli::new(backend.api_url())?;

    let out = cli.run(&["login", "--email", EMAIL, "--password", PASSWORD, "--remember"]).await?;
    assert!(out.success(), "login failed: {out:?}");
    assert_eq!(cli.run(&["status"]).await?.json()?["usable"], false);

    let out = cli.run(&["get", "/tasks"]).await?;
    assert!(out.success(), "get failed: {out:?}");
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(cli.run(&["status"]).await?.json()?["usable"], true);
    Ok(())
}

#[tokio::test]
async fn revoked_session_exits_unauthenticated() -> anyhow::Result<()> {
    let backend = Backend::start().await?;
    let cli = TrackerCli::new(backend.api_url())?;
    let other = TrackerCli::new(backend.api_url())?;

    cli.run(&["login", "--email", EMAIL, "--password", PASSWORD, "--remember"]).await?;
    // A second login elsewhere invalidates the first pair.
    other.run(&["login", "--email", EMAIL, "--password", PASSWORD, "--remember"]).await?;

    let out = cli.run(&["get", "/tasks"]).await?;
    assert_eq!(out.code, UNAUTHENTICATED, "{out:?}");
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(cli.run(&["status"]).await?.stdout.trim(), "null");
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Duration;

use super::*;
use crate::test_support::token_for;

fn offline_session() -> anyhow::Result<Session> {
    Session::new(&ClientSettings::new("http://127.0.0.1:9/api"), CredentialStore::in_memory())
}

fn pair(access: String, expires_at: DateTime<Utc>, persistent: bool) -> CredentialPair {
    CredentialPair { access_token: access, refresh_token: Some("R1".to_owned()), expires_at, persistent }
}

#[test]
fn login_stores_pair_and_announces_identity() -> anyhow::Result<()> {
    let session = offline_session()?;
    let mut events = session.subscribe();
    let exp = Utc::now() + Duration::hours(1);

    let identity = session.login(&pair(token_for("42", "ada@example.com", "Admin", exp), exp, true))?;
    assert_eq!(identity.id.as_deref(), Some("42"));
    assert_eq!(session.identity(), Some(identity.clone()));
    assert_eq!(events.try_recv()?, SessionEvent::LoggedIn(identity));
    Ok(())
}

#[test]
fn login_with_undecodable_credential_keeps_it() -> anyhow::Result<()> {
    let session = offline_session()?;
    let exp = Utc::now() + Duration::hours(1);
    assert!(session.login(&pair("opaque".to_owned(), exp, false)).is_err());
    assert!(session.store().read().is_some());
    assert_eq!(session.identity(), None);
    Ok(())
}

#[test]
fn restore_clears_undecodable_credential() -> anyhow::Result<()> {
    let session = offline_session()?;
    let exp = Utc::now() + Duration::hours(1);
    session.store().write(&pair("opaque".to_owned(), exp, true));

    assert_eq!(session.restore(), None);
    assert_eq!(session.store().read(), None);
    Ok(())
}

#[test]
fn restore_keeps_expired_but_decodable_credential() -> anyhow::Result<()> {
    let session = offline_session()?;
    let past = Utc::now() - Duration::hours(1);
    session.store().write(&pair(token_for("7", "grace@example.com", "Employee", past), past, false));

    let identity = session.restore();
    assert_eq!(identity.and_then(|i| i.email), Some("grace@example.com".to_owned()));
    assert!(session.store().read().is_some());
    assert_eq!(session.status().map(|s| s.usable), Some(false));
    Ok(())
}

#[yare::parameterized(
    admin_allowed      = { "Admin", &["Admin", "Manager"], true },
    employee_denied    = { "Employee", &["Admin", "Manager"], false },
    any_role_allowed   = { "Employee", &[], true },
)]
fn role_guard(role: &str, allowed: &[&str], ok: bool) {
    let session = offline_session().expect("session");
    let exp = Utc::now() + Duration::hours(1);
    session.store().write(&pair(token_for("1", "u@example.com", role, exp), exp, false));

    match session.require_role(allowed) {
        Ok(identity) => {
            assert!(ok);
            assert_eq!(identity.role.as_deref(), Some(role));
        }
        Err(e) => {
            assert!(!ok);
            assert_eq!(e, ApiError::Unauthorized { role: Some(role.to_owned()) });
        }
    }
}

#[test]
fn role_guard_without_identity_is_unauthenticated() -> anyhow::Result<()> {
    let session = offline_session()?;
    assert_eq!(session.require_role(&["Admin"]).err(), Some(ApiError::Unauthenticated));
    Ok(())
}

#[tokio::test]
async fn logout_without_credentials_is_a_no_op() -> anyhow::Result<()> {
    let session = offline_session()?;
    let mut events = session.subscribe();

    session.logout().await;
    session.logout().await;

    assert_eq!(session.store().read(), None);
    assert_eq!(events.try_recv()?, SessionEvent::LoggedOut);
    assert_eq!(events.try_recv()?, SessionEvent::LoggedOut);
    Ok(())
}

#[tokio::test]
async fn logout_clears_even_when_revoke_fails() -> anyhow::Result<()> {
    let session = offline_session()?;
    let exp = Utc::now() + Duration::hours(1);
    session.store().write(&pair(token_for("1", "u@example.com", "Admin", exp), exp, true));

    session.logout().await;
    assert_eq!(session.store().read(), None);
    assert_eq!(session.status(), None);
    Ok(())
}

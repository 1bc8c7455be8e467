// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use serde_json::Value;
use tracing::error;

use tracker::config::{Command, Config};
use tracker::credential::store::CredentialStore;
use tracker::error::ApiError;
use tracker::session::Session;

/// Exit code when the user has to log in again.
const EXIT_UNAUTHENTICATED: i32 = 3;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    match run(config).await {
        Ok(()) => {}
        Err(e) => {
            if let Some(ApiError::Unauthenticated) = e.downcast_ref::<ApiError>() {
                eprintln!("error: not logged in, run `tracker login`");
                std::process::exit(EXIT_UNAUTHENTICATED);
            }
            error!("fatal: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = CredentialStore::open(&config.state_dir(), config.session_dir().as_deref());
    let session = Session::new(&config.client_settings(), store)?;
    session.restore();

    match config.command {
        Command::Login { ref email, ref password, remember } => {
            let identity = session.login_with_password(email, password, remember).await?;
            print_json(&serde_json::to_value(identity)?)
        }
        Command::Logout => {
            session.logout().await;
            Ok(())
        }
        Command::Whoami => {
            let identity = session.identity().ok_or(ApiError::Unauthenticated)?;
            print_json(&serde_json::to_value(identity)?)
        }
        Command::Status => match session.status() {
            Some(status) => print_json(&serde_json::to_value(status)?),
            None => {
                println!("null");
                Ok(())
            }
        },
        Command::Get { ref path } => print_json(&session.api().get::<Value>(path).await?),
        Command::Delete { ref path } => print_json(&session.api().delete::<Value>(path).await?),
        Command::Post { ref path, ref data } => {
            let body = parse_data(data.as_deref())?;
            print_json(&session.api().post::<_, Value>(path, &body).await?)
        }
        Command::Put { ref path, ref data } => {
            let body = parse_data(data.as_deref())?;
            print_json(&session.api().put::<_, Value>(path, &body).await?)
        }
    }
}

fn parse_data(data: Option<&str>) -> anyhow::Result<Value> {
    match data {
        Some(text) => Ok(serde_json::from_str(text)?),
        None => Ok(Value::Object(Default::default())),
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    if !value.is_null() {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

use anyhow::Result;
use std::sync::Arc;

use autoflow_client::api::{AccountApi, LoginOutcome};
use autoflow_client::auth::{
    RefreshChannel, RefreshCoordinator, SessionEvent, SessionEvents, TokenStore,
};
use autoflow_client::client::AuthClient;
use autoflow_client::config::{Command, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with the configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!("Using API origin {}", config.base_url);

    let store = Arc::new(TokenStore::open(&config.auth_db)?);
    let session = Arc::new(SessionEvents::new(store.clone()));

    let channel = Arc::new(RefreshChannel::new(
        &config.base_url,
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        channel,
        session.clone(),
    ));
    let client = Arc::new(AuthClient::new(
        config.base_url.clone(),
        store.clone(),
        coordinator,
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);
    let account = AccountApi::new(client.clone(), store.clone());

    let mut session_events = session.subscribe();

    let result = run(command, &account, &client, &store).await;

    // A refresh failure mid-command forces a logout; tell the user once
    if let Ok(SessionEvent::Expired { reason }) = session_events.try_recv() {
        eprintln!("Session expired, please sign in again ({})", reason);
    }

    result
}

async fn run(
    command: Command,
    account: &AccountApi,
    client: &AuthClient,
    store: &TokenStore,
) -> Result<()> {
    match command {
        Command::Login { email } => run_login(account, email).await,
        Command::Logout => {
            account.logout().await;
            println!("Signed out.");
            Ok(())
        }
        Command::Status => {
            run_status(store).await;
            Ok(())
        }
        Command::Get { path } => run_get(client, &path).await,
    }
}

async fn run_login(account: &AccountApi, email: Option<String>) -> Result<()> {
    let email: String = match email {
        Some(email) => email,
        None => dialoguer::Input::new()
            .with_prompt("Email")
            .interact_text()?,
    };
    let password = dialoguer::Password::new()
        .with_prompt("Password")
        .interact()?;

    match account.login(&email, &password).await? {
        LoginOutcome::LoggedIn => println!("Signed in."),
        LoginOutcome::TwoFactorRequired { challenge } => {
            let code: String = dialoguer::Input::new()
                .with_prompt("Two-factor code")
                .interact_text()?;
            account.verify_two_factor(&challenge, &code).await?;
            println!("Signed in.");
        }
    }

    Ok(())
}

async fn run_status(store: &TokenStore) {
    match store.get().await {
        Some(_) => match store.last_updated().await {
            Some(stamp) => println!("Signed in (token updated {})", stamp.to_rfc3339()),
            None => println!("Signed in."),
        },
        None => println!("Signed out."),
    }
}

async fn run_get(client: &AuthClient, path: &str) -> Result<()> {
    let response = client.get(path).await?;
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

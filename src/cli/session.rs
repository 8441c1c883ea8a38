//! CLI session command handlers for login, status, refresh, logout and watch.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::auth::{
    store_for_platform, AuthEvent, AuthEventBus, HttpTokenRefresher, RefreshOutcome,
    SessionService, TokenRefresher,
};
use crate::config::{ClientConfig, Platform};
use crate::lifecycle::{ForegroundSignal, LifecycleHub};
use crate::scheduler::TokenRefreshScheduler;

use super::Cli;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Build the config from env and `.env`, with command-line overrides on top.
///
/// A CLI process does not outlive one command, so the session always goes
/// to the token directory.
pub fn resolve_config(cli: &Cli) -> crate::error::Result<ClientConfig> {
    let _ = dotenvy::dotenv();
    let mut config = ClientConfig::from_lookup(|key| match key {
        "LMS_API_BASE_URL" if cli.base_url.is_some() => cli.base_url.clone(),
        "LMS_TENANT" if cli.tenant.is_some() => cli.tenant.clone(),
        _ => std::env::var(key).ok(),
    })?;
    config.platform = Platform::Native;
    Ok(config)
}

/// Handle `lms-session login <username>`.
pub async fn handle_login(config: &ClientConfig, username: &str) -> CliResult {
    let password = match std::env::var("LMS_PASSWORD") {
        Ok(password) if !password.is_empty() => password,
        _ => prompt_password()?,
    };

    let service = SessionService::new(config, store_for_platform(config), AuthEventBus::new())?;
    let token = service.login(username, &password).await?;

    println!("✅ Logged in to tenant {}", config.tenant);
    match token.expires_at {
        Some(expires) => println!("   Token expires {}", expires.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("   Token expiry unknown"),
    }
    Ok(())
}

fn prompt_password() -> crate::error::Result<String> {
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut password = String::new();
    std::io::stdin().read_line(&mut password)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

/// Handle `lms-session status`.
pub async fn handle_status(config: &ClientConfig) -> CliResult {
    let service = SessionService::new(config, store_for_platform(config), AuthEventBus::new())?;

    println!("🔐 Session Status\n");
    println!("  Tenant:    {}", config.tenant);
    println!("  API:       {}", config.api_base_url);
    println!("  Token dir: {}", config.token_dir.display());

    let status = match service.status().await? {
        Some(token) => match token.expires_at {
            Some(expires) if expires > chrono::Utc::now() => format!(
                "✅ Logged in (expires {})",
                expires.format("%Y-%m-%d %H:%M")
            ),
            Some(_) => "⚠️  Token expired (run `lms-session refresh`)".to_string(),
            None => "✅ Logged in (expiry unknown)".to_string(),
        },
        None => "❌ Not logged in".to_string(),
    };
    println!("  Session:   {status}");
    Ok(())
}

/// Handle `lms-session refresh`.
pub async fn handle_refresh(config: &ClientConfig) -> CliResult {
    let refresher = HttpTokenRefresher::new(config, store_for_platform(config), AuthEventBus::new())?;
    match refresher.refresh().await {
        RefreshOutcome::Refreshed { expires_at } => {
            match expires_at {
                Some(expires) => println!("✅ Token refreshed (expires {})", expires.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("✅ Token refreshed (expiry unknown)"),
            }
            Ok(())
        }
        RefreshOutcome::Failed { error } => Err(error.into()),
    }
}

/// Handle `lms-session logout`.
pub async fn handle_logout(config: &ClientConfig) -> CliResult {
    let service = SessionService::new(config, store_for_platform(config), AuthEventBus::new())?;
    service.logout().await?;
    println!("✅ Logged out from tenant {}", config.tenant);
    Ok(())
}

/// Handle `lms-session watch`.
///
/// Runs the auto-refresh scheduler until ctrl-c or end of input. Each stdin
/// line naming a foreground signal (`resume`, `focus`, `visible`) is emitted
/// on the lifecycle hub. Auto-refresh stops once the session is lost.
pub async fn handle_watch(config: &ClientConfig) -> CliResult {
    let store = store_for_platform(config);
    let events = AuthEventBus::new();
    let refresher = HttpTokenRefresher::new(config, store.clone(), events.clone())?;

    let scheduler = TokenRefreshScheduler::new(&config.tenant, store, Arc::new(refresher));
    let hub = LifecycleHub::new();
    scheduler.attach(&hub)?;

    let printer = follow_auth_events(scheduler.clone(), events.subscribe());

    scheduler.enable(true).await;
    if let Some(pending) = scheduler.pending_refresh() {
        println!(
            "⏳ Next refresh at {} (type resume, focus or visible to re-check)",
            pending.fire_at.format("%H:%M:%S")
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match ForegroundSignal::from_str(line) {
                        Ok(signal) => hub.emit(signal),
                        Err(_) => eprintln!("Unknown signal: {line} (expected resume, focus or visible)"),
                    }
                }
                None => break,
            },
        }
    }

    scheduler.shutdown();
    printer.abort();
    println!("👋 Stopped");
    Ok(())
}

/// Print auth events and stop auto-refresh when the session is cleared.
fn follow_auth_events(
    scheduler: TokenRefreshScheduler,
    mut rx: broadcast::Receiver<AuthEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth event consumer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event {
                AuthEvent::Refreshed { expires_at, .. } => match expires_at {
                    Some(expires) => println!("🔄 Refreshed (expires {})", expires.format("%H:%M:%S")),
                    None => println!("🔄 Refreshed"),
                },
                AuthEvent::RefreshFailed { reason, .. } => {
                    scheduler.enable(false).await;
                    eprintln!("❌ Refresh failed: {reason}");
                    eprintln!("   Session cleared and auto-refresh stopped; run `lms-session login` again.");
                }
                _ => {}
            }
        }
    })
}

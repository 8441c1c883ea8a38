#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Semaphore;

use lms_session::auth::{AuthError, RefreshOutcome, Token, TokenRefresher, TokenStore};
use lms_session::scheduler::{AnchoredClock, Clock};

pub const TENANT: &str = "acme-academy";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn secs(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

pub fn token(access_token: &str, expires_at: Option<DateTime<Utc>>) -> Token {
    Token {
        access_token: access_token.to_string(),
        refresh_token: Some(format!("{access_token}-refresh")),
        expires_at,
        last_refresh: Some(Utc::now()),
    }
}

/// Wall clock that follows tokio time but can also jump ahead on its own,
/// the way wall time keeps moving while a suspended host's timers do not.
#[derive(Debug)]
pub struct SuspendableClock {
    base: AnchoredClock,
    skipped: Mutex<chrono::Duration>,
}

impl SuspendableClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            base: AnchoredClock::new(start),
            skipped: Mutex::new(chrono::Duration::zero()),
        }
    }

    pub fn suspend_for(&self, duration: chrono::Duration) {
        *self.skipped.lock().unwrap() += duration;
    }
}

impl Clock for SuspendableClock {
    fn now(&self) -> DateTime<Utc> {
        self.base.now() + *self.skipped.lock().unwrap()
    }
}

/// Let spawned timer and listener tasks run on the current-thread runtime.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone, Copy)]
enum Script {
    /// Store a token that lives this long from "now".
    Lifetime(chrono::Duration),
    /// Store a token that expires at a fixed instant.
    ExpiresAt(DateTime<Utc>),
    /// Store a token without expiry.
    UnknownExpiry,
    /// Clear the session and report an invalid grant.
    Fail,
}

/// Refresher double that writes tokens into a store, counts calls and can be
/// held mid-refresh behind a gate.
pub struct ScriptedRefresher {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    script: Mutex<Script>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedRefresher {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            script: Mutex::new(Script::Lifetime(secs(3600))),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Block every refresh until a permit is added to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn issue_lifetime(&self, lifetime: chrono::Duration) {
        *self.script.lock().unwrap() = Script::Lifetime(lifetime);
    }

    pub fn issue_expiry_at(&self, expires_at: DateTime<Utc>) {
        *self.script.lock().unwrap() = Script::ExpiresAt(expires_at);
    }

    pub fn issue_unknown_expiry(&self) {
        *self.script.lock().unwrap() = Script::UnknownExpiry;
    }

    pub fn fail(&self) {
        *self.script.lock().unwrap() = Script::Fail;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self) -> RefreshOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let script = *self.script.lock().unwrap();
        let expires_at = match script {
            Script::Fail => {
                self.store.clear(TENANT).await.unwrap();
                return RefreshOutcome::Failed {
                    error: AuthError::ExpiredOrInvalidGrant,
                };
            }
            Script::ExpiresAt(expires_at) => Some(expires_at),
            Script::UnknownExpiry => None,
            Script::Lifetime(lifetime) => Some(self.clock.now() + lifetime),
        };
        self.store
            .save(TENANT, &token(&format!("access-{n}"), expires_at))
            .await
            .unwrap();
        RefreshOutcome::Refreshed { expires_at }
    }
}

/// Store whose reads always fail.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl TokenStore for FailingStore {
    async fn load(&self, _tenant: &str) -> Result<Option<Token>, AuthError> {
        Err(AuthError::Storage("secure storage unavailable".into()))
    }

    async fn save(&self, _tenant: &str, _token: &Token) -> Result<(), AuthError> {
        Ok(())
    }

    async fn clear(&self, _tenant: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

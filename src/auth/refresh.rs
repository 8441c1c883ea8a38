use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use serde::Serialize;

use super::error::AuthError;
use super::events::{AuthEvent, AuthEventBus};
use super::store::TokenStore;
use super::token::{Token, TokenGrant};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::util::RetryPolicy;

pub(crate) const TENANT_HEADER: &str = "X-Tenant-Id";
const REFRESH_PATH: &str = "/auth/refresh";

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new access token was stored.
    Refreshed { expires_at: Option<DateTime<Utc>> },
    /// The session is gone; the refresher already cleared it and published
    /// [`AuthEvent::RefreshFailed`].
    Failed { error: AuthError },
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

/// Obtains a new access token. Implementations own session teardown on
/// failure; callers only look at the outcome.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> RefreshOutcome;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// Refreshes the tenant's session against `POST /auth/refresh`.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use lms_session::auth::{AuthEventBus, HttpTokenRefresher, MemoryTokenStore};
/// use lms_session::config::ClientConfig;
///
/// let config = ClientConfig::builder().api_base_url("https://lms.example.com/api").build();
/// let refresher = HttpTokenRefresher::new(
///     &config,
///     Arc::new(MemoryTokenStore::new()),
///     AuthEventBus::new(),
/// )?;
/// # Ok::<(), lms_session::error::SessionError>(())
/// ```
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    refresh_url: String,
    tenant: String,
    store: Arc<dyn TokenStore>,
    events: AuthEventBus,
    retry: RetryPolicy,
}

impl HttpTokenRefresher {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        events: AuthEventBus,
    ) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            refresh_url: config.endpoint(REFRESH_PATH),
            tenant: config.tenant.clone(),
            store,
            events,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn try_refresh(&self) -> std::result::Result<Token, AuthError> {
        let current = self
            .store
            .load(&self.tenant)
            .await?
            .ok_or(AuthError::NotLoggedIn)?;

        let grant = self
            .retry
            .execute(|| self.request_grant(current.refresh_token.as_deref()))
            .await?;

        let mut token = Token::from_grant(grant, Utc::now());
        if token.refresh_token.is_none() {
            token.refresh_token = current.refresh_token;
        }
        self.store.save(&self.tenant, &token).await?;
        Ok(token)
    }

    async fn request_grant(
        &self,
        refresh_token: Option<&str>,
    ) -> std::result::Result<TokenGrant, AuthError> {
        let resp = self
            .client
            .post(&self.refresh_url)
            .header("Accept", "application/json")
            .header(TENANT_HEADER, &self.tenant)
            .json(&RefreshRequestBody { refresh_token })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after_ms = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));
            return Err(AuthError::from_status(status.as_u16(), retry_after_ms));
        }
        Ok(resp.json().await?)
    }

    async fn tear_down(&self, error: &AuthError) {
        if let Err(clear_err) = self.store.clear(&self.tenant).await {
            tracing::warn!(tenant = %self.tenant, error = %clear_err, "failed to clear session after refresh failure");
        }
        self.events.publish(AuthEvent::RefreshFailed {
            tenant: self.tenant.clone(),
            reason: error.to_string(),
        });
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> RefreshOutcome {
        match self.try_refresh().await {
            Ok(token) => {
                self.events.publish(AuthEvent::Refreshed {
                    tenant: self.tenant.clone(),
                    expires_at: token.expires_at,
                });
                RefreshOutcome::Refreshed {
                    expires_at: token.expires_at,
                }
            }
            Err(error) => {
                self.tear_down(&error).await;
                RefreshOutcome::Failed { error }
            }
        }
    }
}

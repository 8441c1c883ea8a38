use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::error::AuthError;
use super::events::{AuthEvent, AuthEventBus};
use super::refresh::TENANT_HEADER;
use super::store::TokenStore;
use super::token::{Token, TokenGrant};
use crate::config::ClientConfig;
use crate::error::{Result, SessionError};

const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Serialize)]
struct LoginRequestBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// Session facade: creates the session at login and destroys it at logout.
///
/// All I/O decisions (printing, prompting, exit codes) belong to the caller.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use lms_session::auth::{AuthEventBus, MemoryTokenStore, SessionService};
/// use lms_session::config::ClientConfig;
///
/// # async fn example() -> lms_session::error::Result<()> {
/// let config = ClientConfig::builder().api_base_url("https://lms.example.com/api").build();
/// let svc = SessionService::new(&config, Arc::new(MemoryTokenStore::new()), AuthEventBus::new())?;
/// svc.login("student@example.com", "secret").await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionService {
    client: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    events: AuthEventBus,
}

impl SessionService {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        events: AuthEventBus,
    ) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            config: config.clone(),
            store,
            events,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.config.tenant
    }

    /// Exchange credentials for a session and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Token> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(SessionError::InvalidArgument(
                "username and password are required".into(),
            ));
        }

        let resp = self
            .client
            .post(self.config.endpoint(LOGIN_PATH))
            .header("Accept", "application/json")
            .header(TENANT_HEADER, &self.config.tenant)
            .json(&LoginRequestBody { username, password })
            .send()
            .await
            .map_err(AuthError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::from_status(status.as_u16(), None).into());
        }
        let grant: TokenGrant = resp.json().await.map_err(AuthError::from)?;
        let token = Token::from_grant(grant, Utc::now());

        self.store.save(&self.config.tenant, &token).await?;
        tracing::info!(tenant = %self.config.tenant, expires_at = ?token.expires_at, "logged in");
        self.events.publish(AuthEvent::LoggedIn {
            tenant: self.config.tenant.clone(),
        });
        Ok(token)
    }

    /// Revoke the session server-side (best effort) and always clear it locally.
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.store.load(&self.config.tenant).await? {
            let revoke = self
                .client
                .post(self.config.endpoint(LOGOUT_PATH))
                .header(TENANT_HEADER, &self.config.tenant)
                .bearer_auth(&token.access_token)
                .send()
                .await;
            match revoke {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    tracing::warn!(status = %resp.status(), "server rejected logout; clearing locally")
                }
                Err(e) => tracing::warn!(error = %e, "logout request failed; clearing locally"),
            }
        }

        self.store.clear(&self.config.tenant).await?;
        self.events.publish(AuthEvent::LoggedOut {
            tenant: self.config.tenant.clone(),
        });
        Ok(())
    }

    /// The stored session, if any.
    pub async fn status(&self) -> Result<Option<Token>> {
        Ok(self.store.load(&self.config.tenant).await?)
    }
}

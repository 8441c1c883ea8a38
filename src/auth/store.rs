use std::collections::HashMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::Token;
use crate::config::{ClientConfig, Platform};

const TOKEN_FILE_VERSION: u32 = 1;

/// Storage abstraction for the session token of each tenant.
///
/// Reads are asynchronous because native secure storage is.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, tenant: &str) -> Result<Option<Token>, AuthError>;
    async fn save(&self, tenant: &str, token: &Token) -> Result<(), AuthError>;
    async fn clear(&self, tenant: &str) -> Result<(), AuthError>;

    /// Expiry of the stored token; `None` when absent or unknown.
    async fn expiry(&self, tenant: &str) -> Result<Option<DateTime<Utc>>, AuthError> {
        Ok(self.load(tenant).await?.and_then(|token| token.expires_at))
    }
}

/// Pick the single backend a platform keeps its session in.
pub fn store_for_platform(config: &ClientConfig) -> Arc<dyn TokenStore> {
    match config.platform {
        Platform::Web => Arc::new(MemoryTokenStore::new()),
        Platform::Native => Arc::new(FileTokenStore::new(TokenStoreConfig::new(
            config.token_dir.clone(),
        ))),
    }
}

/// Process-memory store used by web hosts; the session dies with the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokens(&self) -> std::sync::MutexGuard<'_, HashMap<String, Token>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, tenant: &str) -> Result<Option<Token>, AuthError> {
        Ok(self.tokens().get(&normalize_label(tenant)).cloned())
    }

    async fn save(&self, tenant: &str, token: &Token) -> Result<(), AuthError> {
        self.tokens().insert(normalize_label(tenant), token.clone());
        Ok(())
    }

    async fn clear(&self, tenant: &str) -> Result<(), AuthError> {
        self.tokens().remove(&normalize_label(tenant));
        Ok(())
    }
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

/// Owner-only TOML files, one per tenant. Stands in for the platform's
/// secure storage on native hosts.
///
/// # Example
/// ```no_run
/// use lms_session::auth::{FileTokenStore, Token, TokenStore, TokenStoreConfig};
///
/// # async fn example() -> Result<(), lms_session::auth::AuthError> {
/// let store = FileTokenStore::new(TokenStoreConfig::new("/tmp/lms".into()));
/// let token = Token {
///     access_token: "access".to_string(),
///     refresh_token: None,
///     expires_at: None,
///     last_refresh: None,
/// };
/// store.save("acme-academy", &token).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    fn token_path(&self, tenant: &str) -> PathBuf {
        self.base_dir.join(format!("{}.toml", normalize_label(tenant)))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, tenant: &str) -> Result<Option<Token>, AuthError> {
        let path = self.token_path(tenant);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: TokenFile = toml::from_str(&raw)?;
        if file.version != TOKEN_FILE_VERSION {
            return Err(AuthError::Storage(format!(
                "unsupported token file version {} at {}",
                file.version,
                path.display()
            )));
        }
        Ok(Some(file.token))
    }

    async fn save(&self, tenant: &str, token: &Token) -> Result<(), AuthError> {
        let path = self.token_path(tenant);
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            tenant: tenant.to_string(),
            saved_at: Utc::now(),
            token: token.clone(),
        };
        let serialized = toml::to_string(&file)?;
        tokio::task::spawn_blocking(move || atomic_write(&path, serialized.as_bytes()))
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?
    }

    async fn clear(&self, tenant: &str) -> Result<(), AuthError> {
        let path = self.token_path(tenant);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    tenant: String,
    saved_at: DateTime<Utc>,
    token: Token,
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| AuthError::Storage(format!("{} has no file name", path.display())))?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

/// Fold a tenant label into a safe file stem.
pub(crate) fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let out: String = trimmed
        .chars()
        .map(|ch| {
            let lower = ch.to_ascii_lowercase();
            if lower.is_ascii_alphanumeric() || lower == '-' {
                lower
            } else {
                '-'
            }
        })
        .collect();
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}

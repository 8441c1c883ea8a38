//! Convenience re-exports for common use.

pub use crate::auth::{
    store_for_platform, AuthError, AuthEvent, AuthEventBus, HttpTokenRefresher, RefreshOutcome,
    SessionService, Token, TokenRefresher, TokenStore,
};
pub use crate::config::{ClientConfig, Platform};
pub use crate::error::{Result, SessionError};
pub use crate::lifecycle::{ForegroundSignal, LifecycleHub, Subscription};
pub use crate::scheduler::{RefreshReason, RefreshTuning, TokenRefreshScheduler};

//! lms-session: client session layer for a multi-tenant LMS.
//!
//! Stores the tenant's access token, refreshes it shortly before it expires
//! and re-checks it whenever the application regains the foreground.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lms_session::prelude::*;
//!
//! # async fn example() -> lms_session::error::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let store = store_for_platform(&config);
//! let events = AuthEventBus::new();
//!
//! let session = SessionService::new(&config, store.clone(), events.clone())?;
//! session.login("student@example.com", "secret").await?;
//!
//! let refresher = HttpTokenRefresher::new(&config, store.clone(), events)?;
//! let scheduler = TokenRefreshScheduler::new(&config.tenant, store, Arc::new(refresher));
//! let hub = LifecycleHub::new();
//! scheduler.attach(&hub)?;
//! scheduler.enable(true).await;
//!
//! hub.emit(ForegroundSignal::Focus);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod prelude;
pub mod scheduler;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

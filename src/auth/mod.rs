//! Session tokens: storage, refresh, login/logout and auth events.

pub mod error;
pub mod events;
pub mod refresh;
pub mod service;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use events::{AuthEvent, AuthEventBus};
pub use refresh::{HttpTokenRefresher, RefreshOutcome, TokenRefresher};
pub use service::SessionService;
pub use store::{store_for_platform, FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreConfig};
pub use token::Token;

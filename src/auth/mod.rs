//! OAuth token acquisition and credential caching.

pub mod authenticator;
pub mod error;
pub mod grant;
pub mod store;
pub mod token;

pub use authenticator::{AuthFailure, Authenticator};
pub use error::AuthError;
pub use grant::{Grant, GrantKind};
pub use store::{FileTokenStore, InMemoryTokenStore, TokenStore};
pub use token::Credential;

//! # Auth Module
//!
//! Credential handling for plugins talking to external trackers.
//!
//! ## Architecture
//!
//! - **Authenticators**: One [`Authenticator`] per auth scheme (basic, API key,
//!   bearer, OAuth2) that turns an [`AuthConfig`] into a [`TokenInfo`] and
//!   decorates outbound `reqwest` requests with it
//! - **Auth Manager**: [`AuthManager`] caches one token per plugin and
//!   refreshes it ahead of expiry
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::Duration;
//! use zen_core::auth::{AuthConfig, AuthManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = AuthManager::new();
//! auth.authenticate_plugin("github", &AuthConfig::bearer("ghp_token")).await?;
//!
//! let request = auth.add_auth_to_request(
//!     "github",
//!     reqwest::Client::new().get("https://api.github.com/user"),
//! )?;
//! auth.ensure_valid_token("github", Duration::minutes(5)).await?;
//! # let _ = request;
//! # Ok(())
//! # }
//! ```

pub mod authenticators;
pub mod manager;
pub mod token;

pub use authenticators::{
    ApiKeyAuthenticator, Authenticator, BasicAuthenticator, BearerAuthenticator,
    OAuth2Authenticator, OAuth2TokenResponse, DEFAULT_API_KEY_HEADER,
};
pub use manager::AuthManager;
pub use token::{AuthConfig, AuthType, TokenInfo};

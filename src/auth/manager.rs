//! # Auth Manager
//!
//! Per-plugin token cache sitting in front of the authenticators.
//!
//! Plugins register their [`AuthConfig`] once (through
//! [`AuthManager::authenticate_plugin`]); afterwards adapters call
//! [`AuthManager::add_auth_to_request`] on every outbound request and
//! [`AuthManager::ensure_valid_token`] before long-running work. A plugin has at
//! most one live token at a time.
//!
//! The plugin table sits behind a single readers-writer lock that is never
//! held across a network call: tokens are fetched outside the lock and
//! swapped in afterwards.

use chrono::Duration as ChronoDuration;
use parking_lot::RwLock;
use reqwest::RequestBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::{
    ApiKeyAuthenticator, AuthConfig, AuthType, Authenticator, BasicAuthenticator,
    BearerAuthenticator, OAuth2Authenticator, TokenInfo,
};
use crate::error::{ZenError, ZenResult};

#[derive(Debug, Clone)]
struct PluginCredentials {
    config: AuthConfig,
    token: Option<TokenInfo>,
}

#[derive(Debug)]
pub struct AuthManager {
    authenticators: HashMap<AuthType, Arc<dyn Authenticator>>,
    plugins: RwLock<HashMap<String, PluginCredentials>>,
}

impl AuthManager {
    /// Manager with the built-in authenticators for every auth type
    pub fn new() -> Self {
        Self::with_http_client(reqwest::Client::new())
    }

    /// Use `client` for OAuth2 token endpoint calls
    pub fn with_http_client(client: reqwest::Client) -> Self {
        let mut manager = Self {
            authenticators: HashMap::new(),
            plugins: RwLock::new(HashMap::new()),
        };
        manager.register_authenticator(Arc::new(BasicAuthenticator));
        manager.register_authenticator(Arc::new(ApiKeyAuthenticator));
        manager.register_authenticator(Arc::new(BearerAuthenticator));
        manager.register_authenticator(Arc::new(OAuth2Authenticator::new(client)));
        manager
    }

    /// Replace the authenticator for its auth type
    pub fn register_authenticator(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticators
            .insert(authenticator.auth_type(), authenticator);
    }

    fn authenticator(&self, auth_type: AuthType) -> ZenResult<Arc<dyn Authenticator>> {
        self.authenticators
            .get(&auth_type)
            .cloned()
            .ok_or_else(|| {
                ZenError::AuthenticationError(format!("no authenticator for auth type {auth_type}"))
            })
    }

    fn credentials(&self, plugin: &str) -> ZenResult<PluginCredentials> {
        self.plugins.read().get(plugin).cloned().ok_or_else(|| {
            ZenError::AuthenticationError(format!("plugin {plugin} has not authenticated"))
        })
    }

    fn store_token(&self, plugin: &str, config: AuthConfig, token: TokenInfo) {
        self.plugins.write().insert(
            plugin.to_string(),
            PluginCredentials {
                config,
                token: Some(token),
            },
        );
    }

    /// Authenticate `plugin` with `config` and cache the resulting token
    pub async fn authenticate_plugin(&self, plugin: &str, config: &AuthConfig) -> ZenResult<TokenInfo> {
        let authenticator = self.authenticator(config.auth_type)?;
        authenticator.validate_config(config)?;

        let token = authenticator.authenticate(config).await.map_err(|e| {
            warn!(plugin = %plugin, auth_type = %config.auth_type, error = %e, "Authentication failed");
            e
        })?;

        info!(
            plugin = %plugin,
            auth_type = %config.auth_type,
            expires_at = ?token.expires_at,
            "Plugin authenticated"
        );
        self.store_token(plugin, config.clone(), token.clone());
        Ok(token)
    }

    /// Install a token obtained elsewhere (e.g. restored from a keychain)
    pub fn set_plugin_token(&self, plugin: &str, config: AuthConfig, token: TokenInfo) {
        self.store_token(plugin, config, token);
    }

    /// The cached token, failing when absent or past `expires_at`
    pub fn get_plugin_token(&self, plugin: &str) -> ZenResult<TokenInfo> {
        let token = self.credentials(plugin)?.token.ok_or_else(|| {
            ZenError::AuthenticationError(format!("no token for plugin {plugin}"))
        })?;

        if token.is_expired() {
            return Err(ZenError::AuthenticationError(format!(
                "token for plugin {plugin} expired"
            )));
        }
        Ok(token)
    }

    /// `now + grace > expires_at`; a plugin without a token counts as expired
    pub fn is_token_expired(&self, plugin: &str, grace: ChronoDuration) -> bool {
        match self.plugins.read().get(plugin).and_then(|c| c.token.as_ref()) {
            Some(token) => token.expires_within(grace),
            None => true,
        }
    }

    /// Refresh the cached token through its authenticator
    pub async fn refresh_plugin_token(&self, plugin: &str) -> ZenResult<TokenInfo> {
        let credentials = self.credentials(plugin)?;
        let current = credentials.token.ok_or_else(|| {
            ZenError::AuthenticationError(format!("no token for plugin {plugin}"))
        })?;
        let authenticator = self.authenticator(credentials.config.auth_type)?;

        let refreshed = authenticator
            .refresh_token(&credentials.config, &current)
            .await?;
        debug!(plugin = %plugin, expires_at = ?refreshed.expires_at, "Plugin token refreshed");
        self.store_token(plugin, credentials.config, refreshed.clone());
        Ok(refreshed)
    }

    /// Return a token valid for at least `grace`, refreshing or re-authenticating as needed
    pub async fn ensure_valid_token(&self, plugin: &str, grace: ChronoDuration) -> ZenResult<TokenInfo> {
        let credentials = self.credentials(plugin)?;

        if let Some(token) = credentials.token.as_ref() {
            if !token.expires_within(grace) {
                return Ok(token.clone());
            }

            let authenticator = self.authenticator(credentials.config.auth_type)?;
            if authenticator.supports_refresh() && token.refresh_token.is_some() {
                match self.refresh_plugin_token(plugin).await {
                    Ok(refreshed) => return Ok(refreshed),
                    Err(e) => {
                        warn!(plugin = %plugin, error = %e, "Token refresh failed, re-authenticating");
                    }
                }
            }
        }

        self.authenticate_plugin(plugin, &credentials.config).await
    }

    /// Decorate `request` with the plugin's current credentials
    pub fn add_auth_to_request(&self, plugin: &str, request: RequestBuilder) -> ZenResult<RequestBuilder> {
        let credentials = self.credentials(plugin)?;
        let token = self.get_plugin_token(plugin)?;
        let authenticator = self.authenticator(credentials.config.auth_type)?;
        Ok(authenticator.add_auth_to_request(request, &token))
    }

    /// Drop the plugin's token; its config is kept for re-authentication
    pub fn clear_plugin_token(&self, plugin: &str) {
        if let Some(credentials) = self.plugins.write().get_mut(plugin) {
            credentials.token = None;
            debug!(plugin = %plugin, "Plugin token cleared");
        }
    }

    /// Forget everything about the plugin
    pub fn remove_plugin(&self, plugin: &str) {
        self.plugins.write().remove(plugin);
    }
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}

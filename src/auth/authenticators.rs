//! # Authenticators
//!
//! One implementation per auth scheme. Each turns an [`AuthConfig`] into a
//! [`TokenInfo`], knows how to stamp that token onto an outbound request, and
//! knows whether (and how) the token can be refreshed.
//!
//! Stateless schemes (basic, API key, static bearer) never talk to the
//! network. OAuth2 exchanges credentials at the configured token endpoint.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

use crate::auth::{AuthConfig, AuthType, TokenInfo};
use crate::error::{ZenError, ZenResult};

pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
const HEADER_NAME_KEY: &str = "header_name";
const DEFAULT_BEARER_LIFETIME_SECS: i64 = 3600;

#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    fn auth_type(&self) -> AuthType;

    /// Reject configs that are missing the credentials this scheme needs
    fn validate_config(&self, config: &AuthConfig) -> ZenResult<()>;

    async fn authenticate(&self, config: &AuthConfig) -> ZenResult<TokenInfo>;

    fn add_auth_to_request(&self, request: RequestBuilder, token: &TokenInfo) -> RequestBuilder;

    /// Produce a fresh token; stateless schemes hand back the token unchanged
    async fn refresh_token(&self, config: &AuthConfig, token: &TokenInfo) -> ZenResult<TokenInfo>;

    /// Whether `refresh_token` can extend an expiring token
    fn supports_refresh(&self) -> bool {
        false
    }
}

fn require<'a>(value: &'a Option<String>, field: &str, auth_type: AuthType) -> ZenResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ZenError::AuthenticationError(format!("{auth_type} auth requires '{field}'"))
        })
}

#[derive(Debug, Default)]
pub struct BasicAuthenticator;

#[async_trait]
impl Authenticator for BasicAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::Basic
    }

    fn validate_config(&self, config: &AuthConfig) -> ZenResult<()> {
        require(&config.username, "username", AuthType::Basic)?;
        require(&config.password, "password", AuthType::Basic)?;
        Ok(())
    }

    async fn authenticate(&self, config: &AuthConfig) -> ZenResult<TokenInfo> {
        self.validate_config(config)?;
        let username = require(&config.username, "username", AuthType::Basic)?;
        let password = require(&config.password, "password", AuthType::Basic)?;

        let encoded = STANDARD.encode(format!("{username}:{password}"));
        Ok(TokenInfo::new(encoded, "Basic"))
    }

    fn add_auth_to_request(&self, request: RequestBuilder, token: &TokenInfo) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Basic {}", token.access_token))
    }

    async fn refresh_token(&self, _config: &AuthConfig, token: &TokenInfo) -> ZenResult<TokenInfo> {
        Ok(token.clone())
    }
}

#[derive(Debug, Default)]
pub struct ApiKeyAuthenticator;

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::ApiKey
    }

    fn validate_config(&self, config: &AuthConfig) -> ZenResult<()> {
        require(&config.api_key, "api_key", AuthType::ApiKey).map(|_| ())
    }

    async fn authenticate(&self, config: &AuthConfig) -> ZenResult<TokenInfo> {
        let key = require(&config.api_key, "api_key", AuthType::ApiKey)?;
        let mut token = TokenInfo::new(key, "ApiKey");
        token.metadata.insert(
            HEADER_NAME_KEY.to_string(),
            config
                .header_name
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
        );
        Ok(token)
    }

    fn add_auth_to_request(&self, request: RequestBuilder, token: &TokenInfo) -> RequestBuilder {
        let header = token
            .metadata
            .get(HEADER_NAME_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_API_KEY_HEADER);
        request.header(header, token.access_token.as_str())
    }

    async fn refresh_token(&self, _config: &AuthConfig, token: &TokenInfo) -> ZenResult<TokenInfo> {
        Ok(token.clone())
    }
}

#[derive(Debug, Default)]
pub struct BearerAuthenticator;

#[async_trait]
impl Authenticator for BearerAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::Bearer
    }

    fn validate_config(&self, config: &AuthConfig) -> ZenResult<()> {
        require(&config.token, "token", AuthType::Bearer).map(|_| ())
    }

    async fn authenticate(&self, config: &AuthConfig) -> ZenResult<TokenInfo> {
        let token = require(&config.token, "token", AuthType::Bearer)?;
        let lifetime = config.expires_in_secs.unwrap_or(DEFAULT_BEARER_LIFETIME_SECS);
        Ok(TokenInfo::new(token, "Bearer").expiring_in_secs(lifetime))
    }

    fn add_auth_to_request(&self, request: RequestBuilder, token: &TokenInfo) -> RequestBuilder {
        request.bearer_auth(&token.access_token)
    }

    async fn refresh_token(&self, _config: &AuthConfig, token: &TokenInfo) -> ZenResult<TokenInfo> {
        Ok(token.clone())
    }
}

/// Token endpoint response body (RFC 6749 §5.1)
#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuth2TokenResponse {
    /// Convert to a token, keeping `previous_refresh` when the server did not rotate it
    pub fn into_token_info(
        self,
        requested_scopes: &[String],
        previous_refresh: Option<&str>,
    ) -> TokenInfo {
        let scopes = match &self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => requested_scopes.to_vec(),
        };

        let mut token = TokenInfo::new(
            self.access_token,
            self.token_type.unwrap_or_else(|| "Bearer".to_string()),
        );
        token.refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string));
        token.scopes = scopes;
        if let Some(expires_in) = self.expires_in {
            token = token.expiring_in_secs(expires_in);
        }
        token
    }
}

#[derive(Debug, Default)]
pub struct OAuth2Authenticator {
    client: reqwest::Client,
}

impl OAuth2Authenticator {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn request_token(
        &self,
        token_url: &str,
        form: &[(&str, &str)],
        requested_scopes: &[String],
        previous_refresh: Option<&str>,
    ) -> ZenResult<TokenInfo> {
        let response = self.client.post(token_url).form(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZenError::AuthenticationError(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let body: OAuth2TokenResponse = response.json().await?;
        Ok(body.into_token_info(requested_scopes, previous_refresh))
    }
}

#[async_trait]
impl Authenticator for OAuth2Authenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::OAuth2
    }

    fn validate_config(&self, config: &AuthConfig) -> ZenResult<()> {
        require(&config.client_id, "client_id", AuthType::OAuth2)?;
        require(&config.token_url, "token_url", AuthType::OAuth2)?;
        if config.authorization_code.is_none() {
            require(&config.client_secret, "client_secret", AuthType::OAuth2)?;
        }
        Ok(())
    }

    async fn authenticate(&self, config: &AuthConfig) -> ZenResult<TokenInfo> {
        self.validate_config(config)?;
        let token_url = require(&config.token_url, "token_url", AuthType::OAuth2)?;
        let client_id = require(&config.client_id, "client_id", AuthType::OAuth2)?;
        let scope = config.scopes.join(" ");

        let mut form: Vec<(&str, &str)> = vec![("client_id", client_id)];
        if let Some(secret) = config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        match config.authorization_code.as_deref() {
            Some(code) => {
                form.push(("grant_type", "authorization_code"));
                form.push(("code", code));
                if let Some(redirect_uri) = config.redirect_uri.as_deref() {
                    form.push(("redirect_uri", redirect_uri));
                }
            }
            None => form.push(("grant_type", "client_credentials")),
        }
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        let token = self
            .request_token(token_url, &form, &config.scopes, None)
            .await?;
        info!(
            token_url = %token_url,
            expires_at = ?token.expires_at,
            "OAuth2 token acquired"
        );
        Ok(token)
    }

    fn add_auth_to_request(&self, request: RequestBuilder, token: &TokenInfo) -> RequestBuilder {
        request.bearer_auth(&token.access_token)
    }

    async fn refresh_token(&self, config: &AuthConfig, token: &TokenInfo) -> ZenResult<TokenInfo> {
        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
            ZenError::AuthenticationError("OAuth2 token has no refresh token".to_string())
        })?;
        let token_url = require(&config.token_url, "token_url", AuthType::OAuth2)?;
        let client_id = require(&config.client_id, "client_id", AuthType::OAuth2)?;

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ];
        if let Some(secret) = config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        debug!(token_url = %token_url, "Refreshing OAuth2 token");
        self.request_token(token_url, &form, &token.scopes, Some(refresh_token))
            .await
    }

    fn supports_refresh(&self) -> bool {
        true
    }
}

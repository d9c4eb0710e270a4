//! Credential and token shapes shared by every authenticator.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Auth scheme names used at the plugin boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Basic,
    ApiKey,
    Bearer,
    #[serde(rename = "oauth2")]
    OAuth2,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::ApiKey => write!(f, "api_key"),
            Self::Bearer => write!(f, "bearer"),
            Self::OAuth2 => write!(f, "oauth2"),
        }
    }
}

impl FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "api_key" => Ok(Self::ApiKey),
            "bearer" => Ok(Self::Bearer),
            "oauth2" => Ok(Self::OAuth2),
            _ => Err(format!("Invalid auth type: {s}")),
        }
    }
}

/// Credentials a plugin hands to the auth layer
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub auth_type: AuthType,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Header carrying the API key; `X-API-Key` when unset
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Lifetime of a static bearer token, one hour when unset
    #[serde(default)]
    pub expires_in_secs: Option<i64>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    /// Switches OAuth2 from client credentials to the authorization-code grant
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl AuthConfig {
    /// Config of the given type with every credential unset
    pub fn of_type(auth_type: AuthType) -> Self {
        Self {
            auth_type,
            username: None,
            password: None,
            api_key: None,
            header_name: None,
            token: None,
            expires_in_secs: None,
            client_id: None,
            client_secret: None,
            token_url: None,
            authorization_code: None,
            redirect_uri: None,
            scopes: Vec::new(),
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::of_type(AuthType::Basic)
        }
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::of_type(AuthType::ApiKey)
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::of_type(AuthType::Bearer)
        }
    }

    pub fn oauth2_client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            token_url: Some(token_url.into()),
            ..Self::of_type(AuthType::OAuth2)
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "***")
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("auth_type", &self.auth_type)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("api_key", &redact(&self.api_key))
            .field("header_name", &self.header_name)
            .field("token", &redact(&self.token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// A live credential for one plugin
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// `None` for credentials that never expire (basic, API keys)
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TokenInfo {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: token_type.into(),
            expires_at: None,
            scopes: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Set `expires_at` to `now + lifetime`. A lifetime past the representable
    /// range leaves the token without expiry; a hugely negative one expires it now.
    pub fn expiring_in(mut self, lifetime: ChronoDuration) -> Self {
        let now = Utc::now();
        self.expires_at = match now.checked_add_signed(lifetime) {
            Some(at) => Some(at),
            None if lifetime < ChronoDuration::zero() => Some(now),
            None => None,
        };
        self
    }

    /// [`expiring_in`](Self::expiring_in) for a lifetime in seconds, as token endpoints report it
    pub fn expiring_in_secs(self, secs: i64) -> Self {
        let lifetime = ChronoDuration::try_seconds(secs).unwrap_or(if secs < 0 {
            ChronoDuration::MIN
        } else {
            ChronoDuration::MAX
        });
        self.expiring_in(lifetime)
    }

    /// `now > expires_at`
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() > at)
    }

    /// `now + grace > expires_at`, for refreshing ahead of expiry
    pub fn expires_within(&self, grace: ChronoDuration) -> bool {
        self.expires_at.is_some_and(|at| {
            Utc::now()
                .checked_add_signed(grace)
                .map_or(grace > ChronoDuration::zero(), |deadline| deadline > at)
        })
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"***")
            .field("refresh_token", &redact(&self.refresh_token))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_checks() {
        let token = TokenInfo::new("abc", "Bearer").expiring_in(ChronoDuration::minutes(2));
        assert!(!token.is_expired());
        assert!(!token.expires_within(ChronoDuration::minutes(1)));
        assert!(token.expires_within(ChronoDuration::minutes(5)));

        let forever = TokenInfo::new("key", "ApiKey");
        assert!(!forever.is_expired());
        assert!(!forever.expires_within(ChronoDuration::days(3650)));
    }

    #[test]
    fn test_out_of_range_lifetimes_saturate() {
        let forever = TokenInfo::new("at", "Bearer").expiring_in_secs(i64::MAX);
        assert!(forever.expires_at.is_none());
        assert!(!forever.is_expired());

        let gone = TokenInfo::new("at", "Bearer").expiring_in_secs(i64::MIN);
        assert!(gone.expires_at.is_some());
        assert!(gone.expires_within(ChronoDuration::seconds(1)));

        let hour = TokenInfo::new("at", "Bearer").expiring_in_secs(3600);
        assert!(hour.expires_within(ChronoDuration::MAX));
        assert!(!hour.expires_within(ChronoDuration::MIN));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let token = TokenInfo::new("super-secret", "Bearer");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("super-secret"));

        let config = AuthConfig::basic("me", "hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("me"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_auth_type_names() {
        assert_eq!("oauth2".parse::<AuthType>().unwrap(), AuthType::OAuth2);
        assert_eq!(AuthType::ApiKey.to_string(), "api_key");
        assert_eq!(serde_json::to_string(&AuthType::OAuth2).unwrap(), "\"oauth2\"");
    }
}

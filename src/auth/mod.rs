use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::IdentityConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    MissingToken(&'static str),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Identity provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("Identity provider returned {0}")]
    Upstream(u16),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Access-token claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl Claims {
    pub fn new(sub: impl Into<String>, email: impl Into<String>, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            email: Some(email.into()),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            aud: None,
            iss: None,
            user_metadata: UserMetadata::default(),
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.user_metadata.full_name = Some(full_name.into());
        self
    }

    /// `user_metadata.full_name`, falling back to `user_metadata.name`
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata
            .full_name
            .as_deref()
            .or(self.user_metadata.name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }
}

/// HS256 verification settings; validation is never skipped
#[derive(Clone, Default)]
pub struct AuthSettings {
    secret: Option<String>,
    audience: Option<String>,
    issuer: Option<String>,
}

impl AuthSettings {
    pub fn new(secret: Option<String>, audience: Option<String>, issuer: Option<String>) -> Self {
        Self { secret, audience, issuer }
    }

    pub fn from_config(identity: &IdentityConfig) -> Self {
        Self::new(
            identity.jwt_secret.clone(),
            identity.jwt_audience.clone(),
            identity.jwt_issuer.clone(),
        )
    }

    fn secret(&self) -> Result<&str, AuthError> {
        self.secret
            .as_deref()
            .ok_or(AuthError::NotConfigured("JWT secret"))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let key = DecodingKey::from_secret(self.secret()?.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }

        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Signs claims with the configured secret, filling in audience and issuer
    pub fn sign(&self, mut claims: Claims) -> Result<String, AuthError> {
        if claims.aud.is_none() {
            claims.aud = self.audience.clone();
        }
        if claims.iss.is_none() {
            claims.iss = self.issuer.clone();
        }
        let key = EncodingKey::from_secret(self.secret()?.as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Password-grant proxy to the identity provider
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    url: Option<String>,
    anon_key: Option<String>,
}

impl IdentityClient {
    pub fn new(identity: &IdentityConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: identity.url.clone(),
            anon_key: identity.anon_key.clone(),
        })
    }

    fn token_url(base: &str) -> String {
        format!("{}/auth/v1/token?grant_type=password", base.trim_end_matches('/'))
    }

    /// Exchanges email and password for the provider's session JSON
    pub async fn login(&self, email: &str, password: &str) -> Result<Value, AuthError> {
        let url = self.url.as_deref().ok_or(AuthError::NotConfigured("SUPABASE_URL"))?;
        let key = self
            .anon_key
            .as_deref()
            .ok_or(AuthError::NotConfigured("SUPABASE_ANON_KEY"))?;

        let response = self
            .client
            .post(Self::token_url(url))
            .header("apikey", key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Password grant succeeded for {}", email);
            return response.json().await.map_err(|e| AuthError::Unreachable(e.to_string()));
        }

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Password grant rejected for {}", email);
                Err(AuthError::InvalidCredentials)
            }
            other => Err(AuthError::Upstream(other.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings::new(
            Some("test-secret".to_string()),
            Some("authenticated".to_string()),
            None,
        )
    }

    #[test]
    fn round_trips_signed_claims() {
        let settings = settings();
        let claims = Claims::new("abc", "ana@ucb.edu.bo", chrono::Duration::minutes(5)).with_full_name("Ana Pérez");
        let token = settings.sign(claims).unwrap();
        let decoded = settings.validate(&token).unwrap();
        assert_eq!(decoded.sub, "abc");
        assert_eq!(decoded.email.as_deref(), Some("ana@ucb.edu.bo"));
        assert_eq!(decoded.full_name(), Some("Ana Pérez"));
    }

    #[test]
    fn rejects_wrong_secret_audience_and_expiry() {
        let claims = Claims::new("abc", "ana@ucb.edu.bo", chrono::Duration::minutes(5));

        let other = AuthSettings::new(Some("other".to_string()), Some("authenticated".to_string()), None);
        let token = other.sign(claims.clone()).unwrap();
        assert!(matches!(settings().validate(&token), Err(AuthError::InvalidToken(_))));

        let mut wrong_aud = claims.clone();
        wrong_aud.aud = Some("anon".to_string());
        let token = settings().sign(wrong_aud).unwrap();
        assert!(settings().validate(&token).is_err());

        let expired = Claims::new("abc", "ana@ucb.edu.bo", chrono::Duration::hours(-2));
        let token = settings().sign(expired).unwrap();
        assert!(settings().validate(&token).is_err());
    }

    #[test]
    fn refuses_to_validate_without_secret() {
        let settings = AuthSettings::default();
        assert!(matches!(settings.validate("x.y.z"), Err(AuthError::NotConfigured(_))));
    }

    #[test]
    fn full_name_falls_back_to_name() {
        let mut claims = Claims::new("abc", "a@b.c", chrono::Duration::minutes(1));
        claims.user_metadata.name = Some("Luis".to_string());
        assert_eq!(claims.full_name(), Some("Luis"));
    }

    #[test]
    fn builds_password_grant_url() {
        assert_eq!(
            IdentityClient::token_url("https://idp.example.com/"),
            "https://idp.example.com/auth/v1/token?grant_type=password"
        );
    }

    #[tokio::test]
    async fn login_without_provider_is_not_configured() {
        let client = IdentityClient::new(&IdentityConfig::default(), Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.login("a@b.c", "pw").await,
            Err(AuthError::NotConfigured(_))
        ));
    }
}

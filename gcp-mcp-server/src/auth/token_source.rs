//! OAuth2 access token sources.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::credentials::{AuthorizedUserKey, ServiceAccountKey};
use super::AuthError;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn new(value: String, expires_in: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + expires_in,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now() + EXPIRY_MARGIN
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, AuthError>;
}

async fn read_token_response(response: reqwest::Response) -> Result<AccessToken, AuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }
    let token: TokenResponse = response.json().await?;
    Ok(AccessToken::new(
        token.access_token,
        Duration::from_secs(token.expires_in),
    ))
}

// ============================================================================
// Service account (signed JWT assertion)
// ============================================================================

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self { key }
    }

    fn signed_assertion(&self) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(encode(&header, &claims, &key)?)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, AuthError> {
        let assertion = self.signed_assertion()?;
        let response = client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        read_token_response(response).await
    }
}

// ============================================================================
// Authorized user (gcloud refresh token)
// ============================================================================

pub struct AuthorizedUserTokenSource {
    key: AuthorizedUserKey,
    token_uri: String,
}

impl AuthorizedUserTokenSource {
    pub fn new(key: AuthorizedUserKey, token_uri: impl Into<String>) -> Self {
        Self {
            key,
            token_uri: token_uri.into(),
        }
    }
}

#[async_trait]
impl TokenSource for AuthorizedUserTokenSource {
    async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, AuthError> {
        let response = client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.key.client_id.as_str()),
                ("client_secret", self.key.client_secret.as_str()),
                ("refresh_token", self.key.refresh_token.as_str()),
            ])
            .send()
            .await?;
        read_token_response(response).await
    }
}

// ============================================================================
// Compute metadata server
// ============================================================================

pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

pub struct MetadataTokenSource {
    base_url: String,
}

impl MetadataTokenSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn fetch_token(&self, client: &reqwest::Client) -> Result<AccessToken, AuthError> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.base_url
        );
        let response = client
            .get(&url)
            .header(METADATA_FLAVOR_HEADER, "Google")
            .send()
            .await?;
        read_token_response(response).await
    }
}

// ============================================================================
// Pre-issued token
// ============================================================================

/// Wraps an access token obtained elsewhere (e.g. `gcloud auth print-access-token`).
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch_token(&self, _client: &reqwest::Client) -> Result<AccessToken, AuthError> {
        Ok(AccessToken::new(
            self.token.clone(),
            Duration::from_secs(3600),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness() {
        let fresh = AccessToken::new("a".to_string(), Duration::from_secs(3600));
        assert!(fresh.is_fresh());

        let almost_expired = AccessToken::new("b".to_string(), Duration::from_secs(30));
        assert!(!almost_expired.is_fresh());
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticTokenSource::new("ya29.test");
        let token = source.fetch_token(&reqwest::Client::new()).await.unwrap();
        assert_eq!(token.value, "ya29.test");
        assert!(token.is_fresh());
    }

    #[test]
    fn test_service_account_rejects_bad_key() {
        let source = ServiceAccountTokenSource::new(ServiceAccountKey {
            client_email: "bot@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            private_key_id: None,
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            project_id: None,
        });
        assert!(matches!(source.signed_assertion(), Err(AuthError::Jwt(_))));
    }

    #[test]
    fn test_metadata_base_url_trimmed() {
        let source = MetadataTokenSource::new("http://metadata.google.internal/");
        assert_eq!(source.base_url, "http://metadata.google.internal");
    }
}

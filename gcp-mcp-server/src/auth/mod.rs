//! Credential resolution
//!
//! Finds Google Cloud credentials the way the client libraries do
//! (pre-issued token, `GOOGLE_APPLICATION_CREDENTIALS`, gcloud ADC file,
//! compute metadata server) and hands out cached bearer tokens.

pub mod credentials;
mod resolver;
pub mod token_source;

pub use resolver::{AuthResolver, AuthSettings, DEFAULT_METADATA_URL};
pub use token_source::{AccessToken, TokenSource};

use thiserror::Error;

use crate::error::ServiceError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No Google Cloud credentials found")]
    NoCredentials,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to sign token assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        ServiceError::Internal(format!("Authentication failed: {}", err))
    }
}

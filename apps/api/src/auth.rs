//! Caller identity: a bearer token resolved by an external verifier.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken => AppError::Unauthorized,
            AuthError::Unavailable(msg) => {
                AppError::Internal(anyhow::anyhow!("identity verification failed: {msg}"))
            }
        }
    }
}

/// Resolves a bearer token to the caller's id.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(alias = "sub", alias = "id")]
    user_id: String,
}

/// Forwards the token to `IDENTITY_VERIFY_URL`; a 2xx JSON body carrying
/// `user_id` (or `sub` / `id`) identifies the caller.
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    url: String,
}

impl HttpIdentityVerifier {
    pub fn new(url: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("verifier returned {status}")));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(format!("unreadable verifier response: {e}")))?;
        if body.user_id.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(body.user_id)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verified id of the caller, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CallerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let caller = state.identity.verify(token).await?;
        Ok(CallerId(caller))
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;

    use super::*;

    /// Fixed token → caller table.
    #[derive(Default)]
    pub(crate) struct StaticVerifier {
        tokens: HashMap<String, String>,
    }

    impl StaticVerifier {
        pub(crate) fn with(mut self, token: &str, caller: &str) -> Self {
            self.tokens.insert(token.to_string(), caller.to_string());
            self
        }
    }

    #[async_trait]
    impl IdentityVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> Result<String, AuthError> {
            self.tokens
                .get(token)
                .cloned()
                .ok_or(AuthError::InvalidToken)
        }
    }
}

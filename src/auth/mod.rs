//! Access-control guard and token service.
//!
//! Every CRUD handler (except reads on PUBLIC models) calls [`authenticate`]
//! to turn the `Authorization: Bearer` header into an [`AuthSubject`]. All
//! verification failures (missing header, malformed token, bad signature,
//! expired) fold into a single 401 so the cause is never disclosed.

pub mod password;

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier, the only claim the CRUD layer consumes.
    pub id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(id: impl Into<String>, email: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is empty")]
    EmptySecret,

    #[error("token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

pub fn sign_token(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::EmptySecret);
    }
    let key = EncodingKey::from_secret(secret.as_bytes());
    Ok(encode(&Header::default(), claims, &key)?)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::EmptySecret);
    }
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::default())?;
    Ok(data.claims)
}

/// The authenticated principal for one request. Never persisted; only
/// threaded through the handler that extracted it.
#[derive(Debug, Clone)]
pub struct AuthSubject {
    pub id: String,
}

pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthSubject, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let claims = verify_token(token, secret).map_err(|_| ApiError::Unauthorized)?;
    if claims.id.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    Ok(AuthSubject { id: claims.id })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn token_roundtrip_yields_the_subject() {
        let claims = Claims::new("user-1", "a@b.com", 1);
        let token = sign_token(&claims, SECRET).unwrap();

        let subject = authenticate(&headers_with(&token), SECRET).unwrap();
        assert_eq!(subject.id, "user-1");
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = authenticate(&HeaderMap::new(), SECRET).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        let err = authenticate(&headers_with("not-a-jwt"), SECRET).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = sign_token(&Claims::new("user-1", "a@b.com", 1), SECRET).unwrap();
        let err = authenticate(&headers_with(&token), "other-secret").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn non_bearer_scheme_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        let err = authenticate(&headers, SECRET).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}

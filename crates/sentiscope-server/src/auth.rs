//! Password hashing, token issuance/validation and the bearer extractor.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sentiscope_store::{Store, StoreError, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{ApiError, AppState, AuthConfig};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password; the two are indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Any defect in a presented token.
    #[error("invalid token")]
    InvalidToken,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token expiry out of range")]
    ExpiryOutOfRange,

    #[error("token encoding failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Argon2id hash with a random salt, as a PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// `false` for a wrong password or a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign an HS256 token for `subject` valid for the configured lifetime.
pub fn issue_token(auth: &AuthConfig, subject: &str) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: expiry(now, auth.token_ttl())?,
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(auth.secret()),
    )?;
    Ok(token)
}

fn expiry(now: DateTime<Utc>, ttl: TimeDelta) -> Result<i64, AuthError> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or(AuthError::ExpiryOutOfRange)
}

/// Verify signature and expiry with zero leeway.
pub fn decode_token(auth: &AuthConfig, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(auth.secret()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "rejected token");
            AuthError::InvalidToken
        })
}

/// Check an email/password pair against the store.
pub async fn authenticate(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let Some(user) = store.get_user_by_email(email).await? else {
        return Err(AuthError::InvalidCredentials);
    };
    let hash = user.hashed_password.clone();
    let password = password.to_string();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    if ok {
        Ok(user)
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

/// Resolve a bearer token to an existing user.
pub async fn resolve_current_user(state: &AppState, token: &str) -> Result<User, AuthError> {
    let claims = decode_token(&state.auth, token)?;
    state
        .store
        .get_user_by_email(&claims.sub)
        .await?
        .ok_or(AuthError::InvalidToken)
}

/// The token from an `Authorization: Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Extractor for routes that require a valid bearer token.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::InvalidToken)?;
        let user = resolve_current_user(state, token).await?;
        Ok(Self(user))
    }
}

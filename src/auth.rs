//! Bearer tokens, password hashing and the ownership check.
//!
//! A user's token is issued at registration and stored on the user record; it acts as the
//! session credential until it expires. Mutations are allowed only when the presented token
//! verifies cryptographically *and* equals the token on file for the resource's owner.

use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{config::Config, errors::Error, user_models::User};

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,     // Subject (user ID)
    pub email: String, // User email
    pub iss: String,   // Issuer
    pub aud: String,   // Audience
    pub iat: i64,      // Issued at
    pub exp: i64,      // Expiration time
    pub jti: Uuid,     // Token ID, keeps every issued token distinct
}

impl TokenClaims {
    pub fn new(user_id: Uuid, email: &str, config: &Config, now: DateTime<Utc>) -> Self {
        let ttl = chrono::Duration::from_std(config.auth.token_ttl).unwrap_or(chrono::Duration::hours(12));
        Self {
            sub: user_id,
            email: email.to_string(),
            iss: config.auth.issuer.clone(),
            aud: config.auth.audience.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
        }
    }
}

pub fn encode_token(claims: &TokenClaims, config: &Config) -> Result<String, Error> {
    let key = EncodingKey::from_secret(config.secret().as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).map_err(|e| Error::Internal {
        operation: format!("sign token: {e}"),
    })
}

/// Issue a fresh token for a user
pub fn issue_token(user_id: Uuid, email: &str, config: &Config) -> Result<String, Error> {
    encode_token(&TokenClaims::new(user_id, email, config, Utc::now()), config)
}

/// Verify signature, issuer, audience and expiry of a token
pub fn verify_token(token: &str, config: &Config) -> Result<TokenClaims, Error> {
    let key = DecodingKey::from_secret(config.secret().as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[config.auth.issuer.as_str()]);
    validation.set_audience(&[config.auth.audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    decode::<TokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidKeyFormat | ErrorKind::Crypto(_) => Error::Internal {
                operation: format!("verify token: {e}"),
            },
            _ => Error::Unauthenticated,
        })
}

/// Ownership guard: does the presented token equal the owner's token on file?
///
/// Fails closed on empty input. The comparison runs in constant time.
pub fn authorize(presented_token: &str, resource_owner_token: &str) -> bool {
    if presented_token.is_empty() || resource_owner_token.is_empty() {
        return false;
    }
    presented_token
        .as_bytes()
        .ct_eq(resource_owner_token.as_bytes())
        .into()
}

/// Allow the request only if `presented` is a valid token belonging to `owner`.
///
/// `owner` must be the freshly loaded record, not a cached copy.
pub fn require_owner(presented: Option<&str>, owner: &User, config: &Config) -> Result<(), Error> {
    let presented = presented.ok_or(Error::Unauthenticated)?;
    let claims = verify_token(presented, config)?;
    if claims.sub != owner.id || !authorize(presented, &owner.token) {
        return Err(Error::Unauthenticated);
    }
    Ok(())
}

pub fn hash_password(password: &str, config: &Config) -> Result<String, Error> {
    bcrypt::hash(password, config.auth.bcrypt_cost).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    bcrypt::verify(password, hash).map_err(|e| Error::Internal {
        operation: format!("verify password: {e}"),
    })
}

/// The `Authorization` header value, with an optional `Bearer` scheme removed.
///
/// Both `Authorization: <token>` and `Authorization: Bearer <token>` are accepted. The scheme
/// name is matched case-insensitively.
#[derive(Debug, Clone)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| strip_bearer_scheme(value.trim()).to_string())
            .filter(|token| !token.is_empty());
        Ok(Self(token))
    }
}

fn strip_bearer_scheme(value: &str) -> &str {
    match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    }
}

//! JWT auth for API routes.
//!
//! Tokens are HS256 JWTs issued by `POST /api/auth/login` with `sub` set to
//! the user id. On every request the user is reloaded from the database, so
//! role changes and revoked approval take effect immediately.
//!
//! Without a configured secret, tokens are decoded without signature
//! verification (development mode) and issued with an empty key.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;
use crate::config::Config;
use crate::db::UserRow;
use crate::error::ApiError;
use crate::hierarchy::{Principal, Role};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

fn secret_bytes(config: &Config) -> &[u8] {
    config.jwt_secret.as_deref().unwrap_or("").as_bytes()
}

/// Sign an access token for `user`. Returns the token and its expiry.
pub fn issue_token(config: &Config, user: &UserRow) -> anyhow::Result<(String, DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.token_ttl_hours);
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret_bytes(config)),
    )?;
    Ok((token, expires_at))
}

/// Decode and, when a secret is configured, verify a token.
pub fn decode_token(config: &Config, token: &str) -> Result<Claims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(secret) = &config.jwt_secret {
        let key = DecodingKey::from_secret(secret.as_bytes());
        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| format!("JWT verification failed: {}", e))?;
        Ok(data.claims)
    } else {
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(b""), &validation)
            .map_err(|e| format!("JWT decode failed: {}", e))?;
        Ok(data.claims)
    }
}

/// The caller, as loaded from `users` for this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserRow,
    pub principal: Principal,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }
}

/// Resolve the bearer token to an approved user.
///
/// 401 for a missing/invalid token or unknown user, 403 for an account that
/// is not (or no longer) approved.
pub async fn extract_auth_user(state: &Arc<AppState>, parts: &Parts) -> Result<AuthUser, ApiError> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;

    let claims = decode_token(&state.config, token).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthorized("Invalid token".into())
    })?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid token".into()))?;

    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".into()))?;
    if !user.is_approved {
        return Err(ApiError::Forbidden("Account is awaiting approval".into()));
    }
    let principal = user.principal()?;
    Ok(AuthUser { user, principal })
}

/// Any approved, authenticated user.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequireAuth(extract_auth_user(state, parts).await?))
    }
}

/// An approved admin. 403 for any other role.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = extract_auth_user(state, parts).await?;
        if auth_user.role() != Role::Admin {
            return Err(ApiError::Forbidden("Admin access required".into()));
        }
        Ok(RequireAdmin(auth_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            username: "w1".into(),
            full_name: None,
            role: "worker".into(),
            password_hash: String::new(),
            vendor_id: None,
            team_leader_id: None,
            is_approved: true,
            created_at: Utc::now(),
        }
    }

    fn config_with_secret(secret: Option<&str>) -> Config {
        Config {
            jwt_secret: secret.map(str::to_string),
            ..Config::default()
        }
    }

    #[test]
    fn token_round_trip_with_secret() {
        let config = config_with_secret(Some("top-secret"));
        let user = user();
        let (token, expires_at) = issue_token(&config, &user).unwrap();
        assert!(expires_at > Utc::now());

        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "worker");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = issue_token(&config_with_secret(Some("a")), &user()).unwrap();
        let err = decode_token(&config_with_secret(Some("b")), &token).unwrap_err();
        assert!(err.starts_with("JWT verification failed"));
    }

    #[test]
    fn dev_mode_accepts_any_signature() {
        let user = user();
        let (token, _) = issue_token(&config_with_secret(Some("elsewhere")), &user).unwrap();
        let claims = decode_token(&config_with_secret(None), &token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
    }

    #[test]
    fn expired_token_is_rejected_when_verifying() {
        let config = Config {
            token_ttl_hours: -1,
            ..config_with_secret(Some("s"))
        };
        let (token, _) = issue_token(&config, &user()).unwrap();
        assert!(decode_token(&config, &token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_token(&config_with_secret(None), "not.a.jwt").is_err());
    }
}

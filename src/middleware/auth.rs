//! Bearer JWT authentication.
//!
//! Tokens are HS256 JWTs signed with `JWT_SECRET`. The subject claim is the
//! user id. The first time a subject is seen its user row is created from
//! the token claims.

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{self, UpsertUser};
use crate::{error::Error, AppState, Result};

use super::AuthUser;

/// JWT claims accepted by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub exp: usize,
}

/// Sign a token for `sub`, valid for `ttl`.
pub fn issue_token(
    secret: &str,
    sub: &str,
    email: Option<&str>,
    username: Option<&str>,
    ttl: Duration,
) -> Result<String> {
    let exp = chrono::Utc::now().timestamp() as usize + ttl.as_secs() as usize;
    let claims = Claims {
        sub: sub.to_string(),
        email: email.map(str::to_string),
        username: username.map(str::to_string),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
}

/// Verify signature and expiry of a token.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        Error::unauthenticated()
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the user behind the request's bearer token, if any.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<AuthUser>> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let claims = verify_token(&state.config.auth.jwt_secret, token)?;
    if claims.sub.trim().is_empty() {
        return Err(Error::unauthenticated());
    }

    let user = db::ensure_user(
        &state.db,
        UpsertUser {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            username: claims.username.clone(),
        },
    )
    .await?;

    Ok(Some(AuthUser {
        user_id: user.id,
        email: user.email,
        username: user.username,
    }))
}

/// Middleware that requires a valid bearer token and injects [`AuthUser`].
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/notes", post(create_note))
///     .layer(middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, req.headers())
        .await?
        .ok_or_else(Error::unauthenticated)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Middleware that injects [`AuthUser`] when a valid token is present and
/// lets anonymous requests through otherwise.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response> {
    match authenticate(&state, req.headers()).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
        }
        Ok(None) | Err(Error::Unauthenticated(_)) => {}
        Err(e) => return Err(e),
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let token = issue_token("s3cret", "user-1", Some("a@b.c"), None, Duration::from_secs(60)).unwrap();
        let claims = verify_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("a@b.c"));
        assert!(claims.username.is_none());
    }

    #[test]
    fn test_wrong_secret_is_unauthenticated() {
        let token = issue_token("one", "user-1", None, None, Duration::from_secs(60)).unwrap();
        let err = verify_token("two", &token).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}

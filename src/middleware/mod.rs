//! Middleware for DeepDive.
//!
//! - `auth` - bearer JWT verification (`require_auth`, `optional_auth`)
//! - `rate_limit` - per-client request quotas by route tier
//! - `error_envelope` - uniform JSON body for every error response

mod auth;
mod error_envelope;
mod rate_limit;

pub use auth::{issue_token, optional_auth, require_auth, verify_token, Claims};
pub use error_envelope::error_envelope;
pub use rate_limit::{client_key, rate_limit, RateLimits, Tier};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::Error;

/// Authenticated caller, injected by [`require_auth`] or [`optional_auth`].
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(Error::unauthenticated)
    }
}

/// Caller on routes behind [`optional_auth`]. `None` for anonymous requests.
#[derive(Clone, Debug)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.user_id.as_str())
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

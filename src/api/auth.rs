//! Auth Routes
//!
//! Tokens are issued elsewhere; this service only verifies them.
//!
//! Routes:
//! - GET /auth/me - The user behind the bearer token

use axum::{extract::State, routing::get, Json, Router};

use crate::db::{self, User};
use crate::middleware::{require_auth, AuthUser};
use crate::{AppState, Result};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .layer(axum::middleware::from_fn_with_state(state, require_auth))
}

/// GET /auth/me
async fn me(State(state): State<AppState>, user: AuthUser) -> Result<Json<User>> {
    let user = db::get_user(&state.db, &user.user_id).await?;
    Ok(Json(user))
}

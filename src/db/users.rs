//! User queries.
//!
//! Users are created from verified JWT claims the first time a token is
//! seen. There is no local sign-up.

use crate::{Error, Result};
use serde::Serialize;
use sqlx::FromRow;

use super::DbPool;

/// User record from the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Identity taken from a verified token.
#[derive(Debug, Clone, Default)]
pub struct UpsertUser {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

/// Get a user by ID.
pub async fn get_user(pool: &DbPool, id: &str) -> Result<User> {
    get_user_optional(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

pub async fn get_user_optional(pool: &DbPool, id: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Make sure a user row exists for the token subject.
///
/// Existing rows are left untouched. An email already claimed by another
/// subject is dropped rather than failing the request.
pub async fn ensure_user(pool: &DbPool, input: UpsertUser) -> Result<User> {
    if let Some(user) = get_user_optional(pool, &input.id).await? {
        return Ok(user);
    }

    let inserted = insert_user(pool, &input.id, input.email.as_deref(), input.username.as_deref()).await;
    match inserted {
        Ok(()) => {}
        Err(Error::Database(sqlx::Error::Database(ref db_err))) if db_err.is_unique_violation() => {
            insert_user(pool, &input.id, None, input.username.as_deref()).await?;
        }
        Err(e) => return Err(e),
    }

    get_user(pool, &input.id).await
}

async fn insert_user(
    pool: &DbPool,
    id: &str,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, username)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(username)
    .execute(pool)
    .await?;
    Ok(())
}

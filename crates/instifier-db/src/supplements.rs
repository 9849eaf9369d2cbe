//! Database operations for `profile_supplements`.
//!
//! Supplementary fields arrive from outside the acquisition pipeline. They
//! are merged key by key into a JSONB document and never written to
//! `profiles`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `profile_supplements` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplementRow {
    pub username: String,
    pub fields: Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Merges `fields` into the supplement document for `username`.
///
/// Keys present in `fields` overwrite stored keys of the same name; other
/// stored keys are kept.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn merge_supplement(
    pool: &PgPool,
    username: &str,
    fields: &Map<String, Value>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO profile_supplements (username, fields) VALUES ($1, $2) \
         ON CONFLICT (username) DO UPDATE SET \
           fields     = profile_supplements.fields || EXCLUDED.fields, \
           updated_at = NOW()",
    )
    .bind(username)
    .bind(Json(fields))
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_supplement(
    pool: &PgPool,
    username: &str,
) -> Result<Option<SupplementRow>, DbError> {
    Ok(sqlx::query_as::<_, SupplementRow>(
        "SELECT username, fields, created_at, updated_at \
         FROM profile_supplements WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?)
}

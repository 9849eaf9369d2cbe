//! The single stored session token.

use instifier_core::SessionToken;
use sqlx::PgPool;

use crate::DbError;

/// Current session token, if one is stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_session_token(pool: &PgPool) -> Result<Option<SessionToken>, DbError> {
    let token = sqlx::query_scalar::<_, String>("SELECT token FROM session_tokens WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(token.and_then(SessionToken::new))
}

/// Replaces the stored token.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn save_session_token(pool: &PgPool, token: &SessionToken) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO session_tokens (id, token, saved_at) VALUES (1, $1, NOW()) \
         ON CONFLICT (id) DO UPDATE SET token = EXCLUDED.token, saved_at = NOW()",
    )
    .bind(token.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes the stored token. Returns `true` if one existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn clear_session_token(pool: &PgPool) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM session_tokens WHERE id = 1")
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

//! Database operations for `acquisition_runs`, the ledger of batch runs.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, trigger_source, status, forced, requested, \
     succeeded, failed, failed_usernames, elapsed_ms, error_message, started_at, \
     completed_at, created_at";

/// A row from the `acquisition_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AcquisitionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub forced: bool,
    pub requested: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub failed_usernames: Vec<String>,
    pub elapsed_ms: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Opens a run in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_acquisition_run(
    pool: &PgPool,
    trigger_source: &str,
    requested: i32,
    forced: bool,
) -> Result<AcquisitionRunRow, DbError> {
    let row = sqlx::query_as::<_, AcquisitionRunRow>(&format!(
        "INSERT INTO acquisition_runs (public_id, trigger_source, status, requested, forced) \
         VALUES ($1, $2, 'running', $3, $4) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger_source)
    .bind(requested)
    .bind(forced)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a running run as `succeeded` with its outcome counts.
///
/// A batch with failed units still completes; the failures are recorded in
/// `failed` and `failed_usernames`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_acquisition_run(
    pool: &PgPool,
    id: i64,
    succeeded: i32,
    failed_usernames: &[String],
    elapsed_ms: i64,
) -> Result<(), DbError> {
    let failed = i32::try_from(failed_usernames.len()).unwrap_or(i32::MAX);
    let result = sqlx::query(
        "UPDATE acquisition_runs \
         SET status = 'succeeded', completed_at = NOW(), succeeded = $1, failed = $2, \
             failed_usernames = $3, elapsed_ms = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(succeeded)
    .bind(failed)
    .bind(failed_usernames)
    .bind(elapsed_ms)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(())
}

/// Marks a running run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_acquisition_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE acquisition_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has this `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_acquisition_run(pool: &PgPool, id: i64) -> Result<AcquisitionRunRow, DbError> {
    sqlx::query_as::<_, AcquisitionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM acquisition_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Most recent runs first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_acquisition_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<AcquisitionRunRow>, DbError> {
    Ok(sqlx::query_as::<_, AcquisitionRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM acquisition_runs ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

//! Database operations for the `profiles` table.

use chrono::{DateTime, Utc};
use instifier_core::{AccountType, PostRecord, ProfileRecord, Source};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::{from_db_count, to_db_count, DbError};

/// A row from the `profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub account_type: String,
    pub bio: String,
    pub location: String,
    pub profile_url: String,
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    pub date_joined: Option<String>,
    pub posts: Json<Vec<PostRecord>>,
    pub engagement_rate: f64,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    /// Converts the row back into the canonical record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if `source` holds an unknown label.
    pub fn into_record(self) -> Result<ProfileRecord, DbError> {
        let source = Source::from_label(&self.source).ok_or(DbError::InvalidColumn {
            column: "source",
            value: self.source.clone(),
        })?;
        Ok(ProfileRecord {
            username: self.username,
            display_name: self.display_name,
            account_type: AccountType::from_label(&self.account_type),
            bio: self.bio,
            location: self.location,
            profile_url: self.profile_url,
            follower_count: from_db_count(self.follower_count),
            following_count: from_db_count(self.following_count),
            post_count: from_db_count(self.post_count),
            date_joined: self.date_joined,
            posts: self.posts.0,
            engagement_rate: self.engagement_rate,
            scraped_at: self.scraped_at,
            source,
        })
    }
}

/// Inserts or fully replaces the row for `record.username`.
///
/// Returns the row's `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_profile(pool: &PgPool, record: &ProfileRecord) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO profiles \
           (username, display_name, account_type, bio, location, profile_url, \
            follower_count, following_count, post_count, date_joined, posts, \
            engagement_rate, source, scraped_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (username) DO UPDATE SET \
           display_name    = EXCLUDED.display_name, \
           account_type    = EXCLUDED.account_type, \
           bio             = EXCLUDED.bio, \
           location        = EXCLUDED.location, \
           profile_url     = EXCLUDED.profile_url, \
           follower_count  = EXCLUDED.follower_count, \
           following_count = EXCLUDED.following_count, \
           post_count      = EXCLUDED.post_count, \
           date_joined     = EXCLUDED.date_joined, \
           posts           = EXCLUDED.posts, \
           engagement_rate = EXCLUDED.engagement_rate, \
           source          = EXCLUDED.source, \
           scraped_at      = EXCLUDED.scraped_at, \
           updated_at      = NOW() \
         RETURNING id",
    )
    .bind(&record.username)
    .bind(&record.display_name)
    .bind(record.account_type.as_str())
    .bind(&record.bio)
    .bind(&record.location)
    .bind(&record.profile_url)
    .bind(to_db_count(record.follower_count))
    .bind(to_db_count(record.following_count))
    .bind(to_db_count(record.post_count))
    .bind(record.date_joined.as_deref())
    .bind(Json(&record.posts))
    .bind(record.engagement_rate)
    .bind(record.source.as_str())
    .bind(record.scraped_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Last `scraped_at` stored for `username`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_scraped_at(
    pool: &PgPool,
    username: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    Ok(
        sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT scraped_at FROM profiles WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(pool)
        .await?,
    )
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_profile(pool: &PgPool, username: &str) -> Result<Option<ProfileRow>, DbError> {
    Ok(sqlx::query_as::<_, ProfileRow>(
        "SELECT id, username, display_name, account_type, bio, location, profile_url, \
                follower_count, following_count, post_count, date_joined, posts, \
                engagement_rate, source, scraped_at, created_at, updated_at \
         FROM profiles WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?)
}

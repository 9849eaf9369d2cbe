//! Postgres-backed profile and session stores for the acquisition pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instifier_core::{ProfileRecord, SessionToken};
use instifier_scraper::{ProfileStore, ScraperError, SessionStore};
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_err(e: instifier_db::DbError) -> ScraperError {
    ScraperError::Store {
        reason: e.to_string(),
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn find_scraped_at(
        &self,
        username: &str,
    ) -> Result<Option<DateTime<Utc>>, ScraperError> {
        instifier_db::find_scraped_at(&self.pool, username)
            .await
            .map_err(store_err)
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), ScraperError> {
        let id = instifier_db::upsert_profile(&self.pool, record)
            .await
            .map_err(store_err)?;
        tracing::debug!(username = %record.username, id, "profile row upserted");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn load(&self) -> Result<Option<SessionToken>, ScraperError> {
        instifier_db::load_session_token(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn save(&self, token: &SessionToken) -> Result<(), ScraperError> {
        instifier_db::save_session_token(&self.pool, token)
            .await
            .map_err(store_err)
    }

    async fn clear(&self) -> Result<(), ScraperError> {
        instifier_db::clear_session_token(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_err)
    }
}

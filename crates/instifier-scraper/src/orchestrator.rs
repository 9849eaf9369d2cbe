//! Acquisition orchestrator: freshness policy, strategy fallback, persistence
//! handoff, and bounded batch fan-out.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use instifier_core::{normalize_username, Credentials, ProfileRecord, SessionToken, Source};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

const MAX_USERNAME_LEN: usize = 30;

/// Inputs a strategy may use for one fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    pub username: &'a str,
    pub session: Option<&'a SessionToken>,
    pub credentials: Option<&'a Credentials>,
}

/// One way of producing a profile record.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    fn source(&self) -> Source;

    /// # Errors
    ///
    /// Any [`ScraperError`]; the orchestrator treats every error as "not usable".
    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<ProfileRecord, ScraperError>;
}

/// Persistent profile storage keyed by username.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// # Errors
    ///
    /// [`ScraperError::Store`] when the lookup fails.
    async fn find_scraped_at(&self, username: &str)
        -> Result<Option<DateTime<Utc>>, ScraperError>;

    /// Inserts or replaces the record for `record.username`.
    ///
    /// # Errors
    ///
    /// [`ScraperError::Store`] when the write fails.
    async fn upsert(&self, record: &ProfileRecord) -> Result<(), ScraperError>;
}

/// Holder of the single current session token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// [`ScraperError::Store`] when the lookup fails.
    async fn load(&self) -> Result<Option<SessionToken>, ScraperError>;

    /// # Errors
    ///
    /// [`ScraperError::Store`] when the write fails.
    async fn save(&self, token: &SessionToken) -> Result<(), ScraperError>;

    /// # Errors
    ///
    /// [`ScraperError::Store`] when the delete fails.
    async fn clear(&self) -> Result<(), ScraperError>;
}

/// Session store for runs that never authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessions;

#[async_trait]
impl SessionStore for NoSessions {
    async fn load(&self) -> Result<Option<SessionToken>, ScraperError> {
        Ok(None)
    }

    async fn save(&self, _token: &SessionToken) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), ScraperError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub username: String,
    pub credentials: Option<Credentials>,
    /// Skip the freshness check.
    pub force: bool,
}

impl AcquireRequest {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credentials: None,
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    /// Stored record is inside the freshness window; nothing was fetched.
    Cached { scraped_at: DateTime<Utc> },
    Scraped(Box<ProfileRecord>),
    NotFound,
}

/// Aggregate result of [`Acquirer::acquire_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct AcquireSettings {
    pub max_posts: usize,
    pub freshness_window: Duration,
    pub max_concurrent: usize,
    pub unit_timeout: Duration,
}

impl AcquireSettings {
    #[must_use]
    pub fn from_scraper_config(config: &ScraperConfig) -> Self {
        Self {
            max_posts: config.max_posts,
            freshness_window: config.freshness_window,
            max_concurrent: config.max_concurrent_profiles.max(1),
            unit_timeout: config.unit_timeout,
        }
    }
}

/// `true` when `scraped_at` is less than `window` before `now`.
#[must_use]
pub fn is_fresh(scraped_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(scraped_at) < window
}

/// Normalizes and checks a username: 1 to 30 of `a-z`, `0-9`, `.`, `_`.
///
/// # Errors
///
/// [`ScraperError::InvalidUsername`] for anything else.
pub fn validate_username(raw: &str) -> Result<String, ScraperError> {
    let username = normalize_username(raw);
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '_');
    if valid {
        Ok(username)
    } else {
        Err(ScraperError::InvalidUsername {
            username: raw.to_owned(),
        })
    }
}

/// Normalized, de-duplicated usernames in first-seen order; blanks dropped.
#[must_use]
pub fn batch_usernames(raw: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.iter().map(|r| normalize_username(r)) {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// A record with no identity fields and no counts is treated as empty.
fn is_usable(record: &ProfileRecord) -> bool {
    !(record.display_name.is_empty()
        && record.bio.is_empty()
        && record.follower_count == 0
        && record.following_count == 0
        && record.post_count == 0
        && record.posts.is_empty())
}

/// Runs the structured endpoint first and the DOM strategy as fallback.
pub struct Acquirer<E, D, S, T> {
    endpoint: E,
    dom: D,
    store: S,
    sessions: T,
    settings: AcquireSettings,
}

impl<E, D, S, T> Acquirer<E, D, S, T>
where
    E: ProfileSource,
    D: ProfileSource,
    S: ProfileStore,
    T: SessionStore,
{
    #[must_use]
    pub fn new(endpoint: E, dom: D, store: S, sessions: T, settings: AcquireSettings) -> Self {
        Self {
            endpoint,
            dom,
            store,
            sessions,
            settings,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn sessions(&self) -> &T {
        &self.sessions
    }

    /// Acquires one profile.
    ///
    /// # Errors
    ///
    /// [`ScraperError::InvalidUsername`] for malformed usernames and
    /// [`ScraperError::Store`] when the freshness lookup or the upsert fails.
    /// Strategy failures never surface here: they end in
    /// [`AcquireOutcome::NotFound`].
    pub async fn acquire(&self, request: AcquireRequest) -> Result<AcquireOutcome, ScraperError> {
        let username = validate_username(&request.username)?;

        if !request.force {
            if let Some(scraped_at) = self.store.find_scraped_at(&username).await? {
                if is_fresh(scraped_at, Utc::now(), self.settings.freshness_window) {
                    tracing::info!(username = %username, %scraped_at, "profile is fresh, skipping");
                    return Ok(AcquireOutcome::Cached { scraped_at });
                }
            }
        }

        let session = match self.sessions.load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "could not load session token");
                None
            }
        };
        let ctx = FetchContext {
            username: &username,
            session: session.as_ref(),
            credentials: request.credentials.as_ref(),
        };

        let record = match self.via_endpoint(&ctx).await {
            Some(record) => record,
            None => match self.dom.fetch(&ctx).await {
                Ok(record) => record,
                Err(e) if e.is_not_found() => {
                    tracing::info!(username = %username, error = %e, "profile not found");
                    return Ok(AcquireOutcome::NotFound);
                }
                Err(e) => {
                    tracing::warn!(username = %username, error = %e, "all strategies failed");
                    return Ok(AcquireOutcome::NotFound);
                }
            },
        };

        let mut record = record;
        record.finalize(self.settings.max_posts, Utc::now());
        self.store.upsert(&record).await?;
        tracing::info!(
            username = %record.username,
            source = %record.source,
            engagement_rate = record.engagement_rate,
            "profile stored"
        );
        Ok(AcquireOutcome::Scraped(Box::new(record)))
    }

    async fn via_endpoint(&self, ctx: &FetchContext<'_>) -> Option<ProfileRecord> {
        match self.endpoint.fetch(ctx).await {
            Ok(record) if is_usable(&record) => Some(record),
            Ok(_) => {
                tracing::info!(username = ctx.username, "endpoint returned an empty profile, falling back");
                None
            }
            Err(e @ ScraperError::SessionExpired { .. }) => {
                tracing::warn!(username = ctx.username, error = %e, "clearing expired session token");
                if let Err(clear_err) = self.sessions.clear().await {
                    tracing::warn!(error = %clear_err, "could not clear session token");
                }
                None
            }
            Err(e) => {
                tracing::info!(username = ctx.username, error = %e, "endpoint unavailable, falling back");
                None
            }
        }
    }

    /// Acquires every username concurrently, at most `max_concurrent` at a
    /// time. A unit that errors, times out, or panics is reported as failed
    /// without affecting the others.
    pub async fn acquire_batch(
        &self,
        usernames: &[String],
        credentials: Option<&Credentials>,
        force: bool,
    ) -> BatchReport {
        let started = Instant::now();
        let names = batch_usernames(usernames);

        let unit_timeout = self.settings.unit_timeout;
        let results: Vec<(String, bool)> = stream::iter(names)
            .map(|username| {
                let request = AcquireRequest {
                    username: username.clone(),
                    credentials: credentials.cloned(),
                    force,
                };
                async move {
                    let unit = AssertUnwindSafe(self.acquire(request)).catch_unwind();
                    let ok = match tokio::time::timeout(unit_timeout, unit).await {
                        Ok(Ok(Ok(AcquireOutcome::Scraped(_) | AcquireOutcome::Cached { .. }))) => {
                            true
                        }
                        Ok(Ok(Ok(AcquireOutcome::NotFound))) => false,
                        Ok(Ok(Err(e))) => {
                            tracing::warn!(username = %username, error = %e, "batch unit failed");
                            false
                        }
                        Ok(Err(_)) => {
                            tracing::error!(username = %username, "batch unit panicked");
                            false
                        }
                        Err(_) => {
                            tracing::warn!(
                                username = %username,
                                timeout_secs = unit_timeout.as_secs(),
                                "batch unit timed out"
                            );
                            false
                        }
                    };
                    (username, ok)
                }
            })
            .buffer_unordered(self.settings.max_concurrent.max(1))
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (username, ok) in results {
            if ok {
                report.succeeded.push(username);
            } else {
                report.failed.push(username);
            }
        }
        report.succeeded.sort();
        report.failed.sort();
        report.elapsed = started.elapsed();

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "batch finished"
        );
        report
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

//! DOM extraction over a ready profile page.
//!
//! Every header field is read independently: a failing field is logged and
//! left at its zero-value. Only a missing header container aborts the
//! extraction, as not-found.

mod header;
mod posts;
pub(crate) mod selectors;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use instifier_core::{ProfileRecord, Source};

use crate::config::BrowserSettings;
use crate::error::ScraperError;
use crate::page::PageQuery;

/// Turns a ready page into a profile record.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// # Errors
    ///
    /// [`ScraperError::NotFound`] when the page has no profile header, or a
    /// page error raised before any field could be read.
    async fn extract(
        &self,
        page: &dyn PageQuery,
        username: &str,
    ) -> Result<ProfileRecord, ScraperError>;
}

#[derive(Debug, Clone)]
pub struct DomExtractor {
    site_base: String,
    max_posts: usize,
    navigation_timeout: Duration,
    selector_timeout: Duration,
    post_timeout: Duration,
}

impl DomExtractor {
    #[must_use]
    pub fn new(site_base: &str, max_posts: usize, settings: &BrowserSettings) -> Self {
        Self {
            site_base: site_base.trim_end_matches('/').to_owned(),
            max_posts,
            navigation_timeout: settings.navigation_timeout,
            selector_timeout: settings.selector_timeout,
            post_timeout: settings.post_timeout,
        }
    }
}

#[async_trait]
impl PageExtractor for DomExtractor {
    async fn extract(
        &self,
        page: &dyn PageQuery,
        username: &str,
    ) -> Result<ProfileRecord, ScraperError> {
        let mut record = ProfileRecord::new(username, Source::Dom);
        record.profile_url = ProfileRecord::profile_url_for(&self.site_base, &record.username);

        if page.count(selectors::HEADER).await? == 0 {
            return Err(ScraperError::NotFound {
                username: record.username,
            });
        }

        header::extract_header(page, &mut record, self).await;
        record.posts = posts::extract_posts(page, &record, self).await;

        record.finalize(self.max_posts, Utc::now());
        tracing::info!(
            username = %record.username,
            followers = record.follower_count,
            posts = record.posts.len(),
            "profile extracted from page"
        );
        Ok(record)
    }
}

/// Awaits one field read, logging and zero-valuing any failure.
async fn isolated<T, F>(field: &'static str, username: &str, read: F) -> T
where
    T: Default,
    F: Future<Output = Result<T, ScraperError>>,
{
    match read.await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(username, field, error = %e, "field extraction failed");
            T::default()
        }
    }
}

/// Brings the page back to the profile view after a post or panel visit.
async fn return_to_profile(
    page: &dyn PageQuery,
    profile_url: &str,
    timeout: Duration,
) -> Result<(), ScraperError> {
    if on_profile(page, profile_url).await? {
        return Ok(());
    }
    page.go_back().await?;
    if on_profile(page, profile_url).await? {
        return Ok(());
    }
    page.goto(profile_url, timeout).await
}

async fn on_profile(page: &dyn PageQuery, profile_url: &str) -> Result<bool, ScraperError> {
    let current = page.current_url().await?;
    Ok(strip_query(&current).trim_end_matches('/') == profile_url.trim_end_matches('/'))
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[cfg(test)]
#[path = "dom_test.rs"]
mod tests;

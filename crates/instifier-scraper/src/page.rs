//! Capability-scoped view of a live page.
//!
//! Extraction code only sees [`PageQuery`]: locate by selector, read text and
//! attributes, click, fill. Absence is a value (`None`, `false`, empty `Vec`);
//! `Err` is reserved for the page itself misbehaving. The browser binding and
//! the in-memory test page both implement it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;

/// Text of one matched element plus the text of its immediate parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFragment {
    pub text: String,
    pub container: String,
}

#[async_trait]
pub trait PageQuery: Send + Sync {
    /// Navigates and waits for the document to load, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    async fn current_url(&self) -> Result<String, ScraperError>;

    /// Polls until `selector` matches, returning `false` if `timeout` elapses.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, ScraperError>;

    async fn count(&self, selector: &str) -> Result<usize, ScraperError>;

    /// `true` if any element matching `selector` contains `needle` in its text.
    async fn contains_text(&self, selector: &str, needle: &str) -> Result<bool, ScraperError>;

    /// Trimmed text of every match, in document order.
    async fn texts(&self, selector: &str) -> Result<Vec<String>, ScraperError>;

    async fn fragments(&self, selector: &str) -> Result<Vec<TextFragment>, ScraperError>;

    /// Attribute values of every match that carries `name`.
    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<String>, ScraperError>;

    /// Clicks the `index`-th match. `false` if there is no such element.
    async fn click(&self, selector: &str, index: usize) -> Result<bool, ScraperError>;

    /// Clicks the first match whose text contains `text`, case-insensitively.
    async fn click_text(&self, selector: &str, text: &str) -> Result<bool, ScraperError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<bool, ScraperError>;

    async fn press_escape(&self) -> Result<(), ScraperError>;

    async fn go_back(&self) -> Result<(), ScraperError>;

    /// Disables pointer events on full-page overlays that intercept clicks.
    async fn release_overlays(&self) -> Result<(), ScraperError>;

    /// First non-empty text for `selector`.
    async fn text(&self, selector: &str) -> Result<Option<String>, ScraperError> {
        Ok(self
            .texts(selector)
            .await?
            .into_iter()
            .find(|t| !t.is_empty()))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, ScraperError> {
        Ok(self
            .attributes(selector, name)
            .await?
            .into_iter()
            .find(|v| !v.is_empty()))
    }
}

/// A page owned by the session controller: queries plus lifecycle hooks.
#[async_trait]
pub trait BrowserPage: PageQuery {
    /// Installs the user agent and init script before any navigation.
    async fn apply_fingerprint(&self, user_agent: &str, init_script: &str)
        -> Result<(), ScraperError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, ScraperError>;

    /// Full-page PNG written to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), ScraperError>;

    async fn cookie(&self, name: &str) -> Result<Option<String>, ScraperError>;

    fn as_query(&self) -> &dyn PageQuery;

    /// Releases the page, its context, and the browser process.
    async fn close(self: Box<Self>) -> Result<(), ScraperError>;
}

/// Starts a fresh, isolated browser for one acquisition attempt.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>, ScraperError>;
}

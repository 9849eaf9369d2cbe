//! Browser session lifecycle: launch, fingerprint, optional login, navigate,
//! classify, hand off to DOM extraction, close.

pub mod chromium;
mod diagnostics;
mod login;
pub mod stealth;

use async_trait::async_trait;
use instifier_core::{Credentials, ProfileRecord, SessionToken, Source};

use crate::config::BrowserSettings;
use crate::dom::{DomExtractor, PageExtractor};
use crate::error::ScraperError;
use crate::orchestrator::{FetchContext, ProfileSource, SessionStore};
use crate::page::{BrowserPage, Launcher, PageQuery};

use self::login::LoginOutcome;

pub use chromium::ChromiumLauncher;

const LOGIN_WALL_MARKER: &str = "Log in to see";
const NOT_AVAILABLE_MARKER: &str = "Sorry, this page isn't available";
const SESSION_COOKIE: &str = "sessionid";
const NAVIGATION_SNAPSHOT: &str = "navigation-error";

/// States a single browser session passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Launched,
    Configured,
    LoggingIn,
    Authenticated,
    AuthFailed,
    TwoFactorRequired,
    Navigated,
    Blocked,
    NotFound,
    Ready,
    Closed,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Launched => "launched",
            Self::Configured => "configured",
            Self::LoggingIn => "logging_in",
            Self::Authenticated => "authenticated",
            Self::AuthFailed => "auth_failed",
            Self::TwoFactorRequired => "two_factor_required",
            Self::Navigated => "navigated",
            Self::Blocked => "blocked",
            Self::NotFound => "not_found",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

/// Tracks and logs transitions for one session.
#[derive(Debug)]
struct SessionTrace<'a> {
    username: &'a str,
    state: SessionState,
}

impl<'a> SessionTrace<'a> {
    fn new(username: &'a str) -> Self {
        tracing::debug!(username, state = SessionState::Launched.as_str(), "browser session");
        Self {
            username,
            state: SessionState::Launched,
        }
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!(
            username = self.username,
            from = self.state.as_str(),
            to = next.as_str(),
            "browser session transition"
        );
        self.state = next;
    }
}

/// Owns browser launches for profile acquisition and session refresh.
pub struct BrowserController<L> {
    launcher: L,
    settings: BrowserSettings,
    site_base: String,
}

impl<L: Launcher> BrowserController<L> {
    #[must_use]
    pub fn new(launcher: L, settings: BrowserSettings, site_base: &str) -> Self {
        Self {
            launcher,
            settings,
            site_base: site_base.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    #[must_use]
    pub fn site_base(&self) -> &str {
        &self.site_base
    }

    /// Runs one full session for `username` and hands a ready page to
    /// `extractor`. The browser is closed on every path.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::AuthFailed`] / [`ScraperError::TwoFactorRequired`]: login abandoned.
    /// - [`ScraperError::Blocked`]: the profile sits behind a login wall.
    /// - [`ScraperError::NotFound`]: the site reports the page as unavailable.
    /// - [`ScraperError::Timeout`] / [`ScraperError::Browser`]: navigation
    ///   failed after all retries (a diagnostic snapshot is written first).
    pub async fn run<X>(
        &self,
        username: &str,
        credentials: Option<&Credentials>,
        extractor: &X,
    ) -> Result<ProfileRecord, ScraperError>
    where
        X: PageExtractor + ?Sized,
    {
        let page = self.launcher.launch().await?;
        let mut trace = SessionTrace::new(username);

        let result = self
            .drive(page.as_ref(), &mut trace, credentials, extractor)
            .await;

        if let Err(e) = page.close().await {
            tracing::warn!(username, error = %e, "browser close failed");
        }
        trace.advance(SessionState::Closed);
        result
    }

    async fn drive<X>(
        &self,
        page: &dyn BrowserPage,
        trace: &mut SessionTrace<'_>,
        credentials: Option<&Credentials>,
        extractor: &X,
    ) -> Result<ProfileRecord, ScraperError>
    where
        X: PageExtractor + ?Sized,
    {
        let username = trace.username;
        self.configure(page, trace).await?;

        if let Some(credentials) = credentials {
            self.authenticate(page.as_query(), trace, credentials)
                .await?;
        }

        let profile_url = ProfileRecord::profile_url_for(&self.site_base, username);
        if let Err(e) = self.navigate(page.as_query(), &profile_url).await {
            tracing::error!(username, error = %e, "profile navigation failed");
            diagnostics::capture_snapshot(
                page,
                &self.settings.debug_dir,
                username,
                NAVIGATION_SNAPSHOT,
            )
            .await;
            return Err(e);
        }
        trace.advance(SessionState::Navigated);

        match self.classify(page.as_query()).await? {
            SessionState::Blocked => {
                trace.advance(SessionState::Blocked);
                tracing::info!(username, "profile is behind a login wall");
                Err(ScraperError::Blocked {
                    username: username.to_owned(),
                })
            }
            SessionState::NotFound => {
                trace.advance(SessionState::NotFound);
                tracing::info!(username, "profile page is not available");
                Err(ScraperError::NotFound {
                    username: username.to_owned(),
                })
            }
            _ => {
                trace.advance(SessionState::Ready);
                extractor.extract(page.as_query(), username).await
            }
        }
    }

    async fn configure(
        &self,
        page: &dyn BrowserPage,
        trace: &mut SessionTrace<'_>,
    ) -> Result<(), ScraperError> {
        page.apply_fingerprint(&self.settings.user_agent, stealth::INIT_SCRIPT)
            .await?;
        trace.advance(SessionState::Configured);
        Ok(())
    }

    async fn authenticate(
        &self,
        page: &dyn PageQuery,
        trace: &mut SessionTrace<'_>,
        credentials: &Credentials,
    ) -> Result<(), ScraperError> {
        trace.advance(SessionState::LoggingIn);
        match login::log_in(page, credentials, &self.site_base, &self.settings).await {
            LoginOutcome::Authenticated => {
                trace.advance(SessionState::Authenticated);
                Ok(())
            }
            LoginOutcome::TwoFactorRequired => {
                trace.advance(SessionState::TwoFactorRequired);
                tracing::warn!(login = %credentials.login, "login needs a verification code");
                Err(ScraperError::TwoFactorRequired)
            }
            LoginOutcome::AuthFailed(reason) => {
                trace.advance(SessionState::AuthFailed);
                tracing::warn!(login = %credentials.login, %reason, "login failed");
                Err(ScraperError::AuthFailed { reason })
            }
        }
    }

    /// Loads `url`, retrying up to `navigation_retries` extra times.
    async fn navigate(&self, page: &dyn PageQuery, url: &str) -> Result<(), ScraperError> {
        let mut attempt = 0u32;
        loop {
            match page.goto(url, self.settings.navigation_timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.settings.navigation_retries => {
                    attempt += 1;
                    tracing::warn!(
                        url,
                        attempt,
                        retries = self.settings.navigation_retries,
                        error = %e,
                        "navigation failed, retrying"
                    );
                    tokio::time::sleep(self.settings.navigation_retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns `Blocked`, `NotFound`, or `Ready`.
    async fn classify(&self, page: &dyn PageQuery) -> Result<SessionState, ScraperError> {
        let has_main = page.wait_for("main", self.settings.selector_timeout).await?;
        if page.contains_text("body", LOGIN_WALL_MARKER).await? {
            return Ok(SessionState::Blocked);
        }
        if page.contains_text("body", NOT_AVAILABLE_MARKER).await? {
            return Ok(SessionState::NotFound);
        }
        if !has_main {
            tracing::debug!("main element never appeared, extracting anyway");
        }
        Ok(SessionState::Ready)
    }

    /// Logs in with `credentials` and returns the resulting session cookie.
    ///
    /// `Ok(None)` means the login succeeded but no `sessionid` cookie was set.
    ///
    /// # Errors
    ///
    /// [`ScraperError::AuthFailed`] or [`ScraperError::TwoFactorRequired`]
    /// when the login is abandoned; launch failures as [`ScraperError::Browser`].
    pub async fn refresh_session(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<SessionToken>, ScraperError> {
        let page = self.launcher.launch().await?;
        let mut trace = SessionTrace::new(&credentials.login);

        let result: Result<Option<SessionToken>, ScraperError> = async {
            self.configure(page.as_ref(), &mut trace).await?;
            self.authenticate(page.as_query(), &mut trace, credentials)
                .await?;
            let value = page.cookie(SESSION_COOKIE).await?;
            Ok(value.and_then(SessionToken::new))
        }
        .await;

        if let Err(e) = page.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }
        trace.advance(SessionState::Closed);

        if let Ok(Some(_)) = &result {
            tracing::info!(login = %credentials.login, "session refreshed");
        }
        result
    }

    /// Signs in and stores the issued session cookie in `sessions`.
    ///
    /// Returns `false` when the sign-in succeeded but no cookie was issued; the
    /// stored token is left untouched in that case.
    ///
    /// # Errors
    ///
    /// Propagates login failures and store errors.
    pub async fn refresh_into(
        &self,
        credentials: &Credentials,
        sessions: &dyn SessionStore,
    ) -> Result<bool, ScraperError> {
        match self.refresh_session(credentials).await? {
            Some(token) => {
                sessions.save(&token).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// DOM fallback strategy: one browser session per profile.
pub struct BrowserStrategy<L> {
    controller: BrowserController<L>,
    extractor: DomExtractor,
}

impl<L: Launcher> BrowserStrategy<L> {
    #[must_use]
    pub fn new(controller: BrowserController<L>, extractor: DomExtractor) -> Self {
        Self {
            controller,
            extractor,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &BrowserController<L> {
        &self.controller
    }
}

#[async_trait]
impl<L: Launcher> ProfileSource for BrowserStrategy<L> {
    fn source(&self) -> Source {
        Source::Dom
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<ProfileRecord, ScraperError> {
        self.controller
            .run(ctx.username, ctx.credentials, &self.extractor)
            .await
    }
}

#[cfg(test)]
#[path = "browser_test.rs"]
mod tests;

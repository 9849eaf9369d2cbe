//! Chromium binding for [`Launcher`] and [`BrowserPage`] using chromiumoxide.
//!
//! Queries run as small JavaScript snippets with selectors embedded as JSON
//! string literals; clicks on form fields and key presses go through CDP input
//! events.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::stealth::LAUNCH_ARGS;
use crate::config::BrowserSettings;
use crate::error::ScraperError;
use crate::page::{BrowserPage, Launcher, PageQuery, TextFragment};

const PROFILE_DIR_PREFIX: &str = "instifier-chrome-";
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const HISTORY_SETTLE: Duration = Duration::from_millis(500);
const OVERLAY_SELECTORS: &str =
    r#"div[class*="modal"], div[role="presentation"], div[class*="overlay"]"#;

fn cdp_err(context: &str, e: impl std::fmt::Display) -> ScraperError {
    ScraperError::Browser(format!("{context}: {e}"))
}

/// JSON-encodes `value` for embedding in a script.
fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_owned())
}

/// Launches one headless (or headed) Chromium per acquisition attempt.
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig, ScraperError> {
        let (width, height) = self.settings.viewport;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            });
        for arg in LAUNCH_ARGS {
            builder = builder.arg(arg);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| cdp_err("failed to build browser config", e))
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>, ScraperError> {
        let profile_dir = fresh_profile_dir()?;
        let config = self.browser_config(profile_dir.path())?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| cdp_err("failed to launch Chromium", e))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        match browser.new_page("about:blank").await {
            Ok(page) => Ok(Box::new(ChromiumPage {
                browser,
                page,
                handler_task,
                profile_dir,
            })),
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                Err(cdp_err("failed to open page", e))
            }
        }
    }
}

/// Empty user-data directory for one launch, removed when dropped.
fn fresh_profile_dir() -> Result<TempDir, ScraperError> {
    tempfile::Builder::new()
        .prefix(PROFILE_DIR_PREFIX)
        .tempdir()
        .map_err(|e| cdp_err("failed to create browser profile dir", e))
}

/// A single page in a dedicated browser process with its own profile.
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: TempDir,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, ScraperError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| cdp_err("script evaluation failed", e))?
            .into_value::<T>()
            .map_err(|e| cdp_err("unexpected script result", e))
    }
}

#[async_trait]
impl PageQuery for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(cdp_err(&format!("navigation to {url} failed"), e)),
            Err(_) => Err(ScraperError::Timeout {
                step: format!("navigation to {url}"),
                millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| cdp_err("failed to read url", e))?
            .unwrap_or_default())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, ScraperError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count(selector).await? > 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn count(&self, selector: &str) -> Result<usize, ScraperError> {
        self.eval(format!(
            "document.querySelectorAll({}).length",
            js_str(selector)
        ))
        .await
    }

    async fn contains_text(&self, selector: &str, needle: &str) -> Result<bool, ScraperError> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).some(e => (e.innerText || e.textContent || '').includes({}))",
            js_str(selector),
            js_str(needle)
        ))
        .await
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, ScraperError> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).map(e => (e.innerText || e.textContent || '').trim())",
            js_str(selector)
        ))
        .await
    }

    async fn fragments(&self, selector: &str) -> Result<Vec<TextFragment>, ScraperError> {
        let pairs: Vec<(String, String)> = self
            .eval(format!(
                "Array.from(document.querySelectorAll({})).map(e => [\
                    (e.innerText || e.textContent || '').trim(), \
                    ((e.parentElement && e.parentElement.textContent) || '').trim()\
                ])",
                js_str(selector)
            ))
            .await?;
        Ok(pairs
            .into_iter()
            .map(|(text, container)| TextFragment { text, container })
            .collect())
    }

    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<String>, ScraperError> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).map(e => e.getAttribute({})).filter(v => v !== null)",
            js_str(selector),
            js_str(name)
        ))
        .await
    }

    async fn click(&self, selector: &str, index: usize) -> Result<bool, ScraperError> {
        self.eval(format!(
            "(() => {{ const el = document.querySelectorAll({})[{index}]; \
               if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
            js_str(selector)
        ))
        .await
    }

    async fn click_text(&self, selector: &str, text: &str) -> Result<bool, ScraperError> {
        self.eval(format!(
            "(() => {{ const needle = {}.toLowerCase(); \
               const el = Array.from(document.querySelectorAll({})) \
                 .find(e => (e.innerText || e.textContent || '').toLowerCase().includes(needle)); \
               if (!el) return false; el.click(); return true; }})()",
            js_str(text),
            js_str(selector)
        ))
        .await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<bool, ScraperError> {
        if self.count(selector).await? == 0 {
            return Ok(false);
        }
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| cdp_err(&format!("element {selector} not found"), e))?;
        element
            .click()
            .await
            .map_err(|e| cdp_err(&format!("focus on {selector} failed"), e))?
            .type_str(value)
            .await
            .map_err(|e| cdp_err(&format!("typing into {selector} failed"), e))?;
        Ok(true)
    }

    async fn press_escape(&self) -> Result<(), ScraperError> {
        let body = self
            .page
            .find_element("body")
            .await
            .map_err(|e| cdp_err("body not found", e))?;
        body.press_key("Escape")
            .await
            .map_err(|e| cdp_err("escape key failed", e))?;
        Ok(())
    }

    async fn go_back(&self) -> Result<(), ScraperError> {
        let _: bool = self.eval("(() => { window.history.back(); return true; })()".to_owned())
            .await?;
        tokio::time::sleep(HISTORY_SETTLE).await;
        Ok(())
    }

    async fn release_overlays(&self) -> Result<(), ScraperError> {
        let _: usize = self
            .eval(format!(
                "(() => {{ const els = document.querySelectorAll({}); \
                   els.forEach(el => {{ el.style.pointerEvents = 'none'; }}); return els.length; }})()",
                js_str(OVERLAY_SELECTORS)
            ))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn apply_fingerprint(
        &self,
        user_agent: &str,
        init_script: &str,
    ) -> Result<(), ScraperError> {
        self.page
            .set_user_agent(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(|e| cdp_err("failed to set user agent", e))?;
        self.page
            .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(init_script))
            .await
            .map_err(|e| cdp_err("failed to install init script", e))?;
        Ok(())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        self.page
            .content()
            .await
            .map_err(|e| cdp_err("failed to read page html", e))
    }

    async fn screenshot(&self, path: &Path) -> Result<(), ScraperError> {
        let bytes = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| cdp_err("screenshot failed", e))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| cdp_err(&format!("could not write {}", path.display()), e))
    }

    async fn cookie(&self, name: &str) -> Result<Option<String>, ScraperError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| cdp_err("failed to read cookies", e))?;
        Ok(cookies
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.value))
    }

    fn as_query(&self) -> &dyn PageQuery {
        self
    }

    async fn close(self: Box<Self>) -> Result<(), ScraperError> {
        let ChromiumPage {
            mut browser,
            page,
            handler_task,
            profile_dir,
        } = *self;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();
        if let Err(e) = profile_dir.close() {
            tracing::debug!(error = %e, "profile dir cleanup failed");
        }
        closed
            .map(|_| ())
            .map_err(|e| cdp_err("failed to close browser", e))
    }
}

//! Explicit scraper configuration passed into every strategy constructor.

use std::path::PathBuf;
use std::time::Duration;

use instifier_core::{AppConfig, DEFAULT_MAX_POSTS};

/// Settings shared by the endpoint client, the browser controller and the
/// orchestrator.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub endpoint_base: String,
    pub site_base: String,
    pub app_id: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub max_posts: usize,
    pub max_concurrent_profiles: usize,
    pub unit_timeout: Duration,
    pub freshness_window: Duration,
    pub browser: BrowserSettings,
}

/// Browser launch and wait budgets.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    pub post_timeout: Duration,
    pub login_timeout: Duration,
    pub two_factor_wait: Duration,
    pub navigation_retries: u32,
    pub navigation_retry_delay: Duration,
    /// Bounds for the randomized pause between login form actions.
    pub action_pause_ms: (u64, u64),
    pub debug_dir: PathBuf,
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            viewport: (1280, 720),
            navigation_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(15),
            post_timeout: Duration::from_secs(15),
            login_timeout: Duration::from_secs(30),
            two_factor_wait: Duration::from_secs(5),
            navigation_retries: 1,
            navigation_retry_delay: Duration::from_secs(2),
            action_pause_ms: (400, 1200),
            debug_dir: PathBuf::from("./debug"),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            endpoint_base: "https://i.instagram.com".to_owned(),
            site_base: "https://www.instagram.com".to_owned(),
            app_id: "936619743392459".to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout_secs: 20,
            max_retries: 2,
            backoff_base_secs: 2,
            max_posts: DEFAULT_MAX_POSTS,
            max_concurrent_profiles: 2,
            unit_timeout: Duration::from_secs(300),
            freshness_window: Duration::from_secs(24 * 60 * 60),
            browser: BrowserSettings::default(),
        }
    }
}

impl ScraperConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint_base: config.scraper_endpoint_base.clone(),
            site_base: config.scraper_site_base.clone(),
            app_id: config.scraper_app_id.clone(),
            user_agent: config.scraper_user_agent.clone(),
            request_timeout_secs: config.scraper_request_timeout_secs,
            max_retries: config.scraper_max_retries,
            backoff_base_secs: config.scraper_retry_backoff_base_secs,
            max_posts: config.scraper_max_posts,
            max_concurrent_profiles: config.scraper_max_concurrent_profiles.max(1),
            unit_timeout: Duration::from_secs(config.scraper_unit_timeout_secs),
            freshness_window: Duration::from_secs(
                config.scraper_freshness_hours.saturating_mul(60 * 60),
            ),
            browser: BrowserSettings {
                headless: config.browser_headless,
                chrome_path: config.browser_chrome_path.clone(),
                user_agent: config.scraper_user_agent.clone(),
                navigation_timeout: Duration::from_millis(config.browser_navigation_timeout_ms),
                selector_timeout: Duration::from_millis(config.browser_selector_timeout_ms),
                post_timeout: Duration::from_millis(config.browser_post_timeout_ms),
                login_timeout: Duration::from_millis(config.browser_login_timeout_ms),
                two_factor_wait: Duration::from_millis(config.browser_two_factor_wait_ms),
                navigation_retries: config.browser_navigation_retries,
                navigation_retry_delay: Duration::from_millis(
                    config.browser_navigation_retry_delay_ms,
                ),
                debug_dir: config.debug_dir.clone(),
                ..BrowserSettings::default()
            },
        }
    }
}

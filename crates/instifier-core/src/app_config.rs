use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_endpoint_base: String,
    pub scraper_site_base: String,
    pub scraper_app_id: String,
    pub scraper_user_agent: String,
    pub scraper_request_timeout_secs: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    pub scraper_max_posts: usize,
    pub scraper_max_concurrent_profiles: usize,
    pub scraper_unit_timeout_secs: u64,
    pub scraper_freshness_hours: u64,
    pub browser_headless: bool,
    pub browser_chrome_path: Option<PathBuf>,
    pub browser_navigation_timeout_ms: u64,
    pub browser_selector_timeout_ms: u64,
    pub browser_post_timeout_ms: u64,
    pub browser_login_timeout_ms: u64,
    pub browser_two_factor_wait_ms: u64,
    pub browser_navigation_retries: u32,
    pub browser_navigation_retry_delay_ms: u64,
    pub debug_dir: PathBuf,
    pub login_username: Option<String>,
    pub login_password: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("scraper_endpoint_base", &self.scraper_endpoint_base)
            .field("scraper_site_base", &self.scraper_site_base)
            .field("scraper_app_id", &self.scraper_app_id)
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field("scraper_max_posts", &self.scraper_max_posts)
            .field(
                "scraper_max_concurrent_profiles",
                &self.scraper_max_concurrent_profiles,
            )
            .field("scraper_unit_timeout_secs", &self.scraper_unit_timeout_secs)
            .field("scraper_freshness_hours", &self.scraper_freshness_hours)
            .field("browser_headless", &self.browser_headless)
            .field("browser_chrome_path", &self.browser_chrome_path)
            .field(
                "browser_navigation_timeout_ms",
                &self.browser_navigation_timeout_ms,
            )
            .field(
                "browser_selector_timeout_ms",
                &self.browser_selector_timeout_ms,
            )
            .field("browser_post_timeout_ms", &self.browser_post_timeout_ms)
            .field("browser_login_timeout_ms", &self.browser_login_timeout_ms)
            .field(
                "browser_two_factor_wait_ms",
                &self.browser_two_factor_wait_ms,
            )
            .field(
                "browser_navigation_retries",
                &self.browser_navigation_retries,
            )
            .field(
                "browser_navigation_retry_delay_ms",
                &self.browser_navigation_retry_delay_ms,
            )
            .field("debug_dir", &self.debug_dir)
            .field("login_username", &self.login_username)
            .field(
                "login_password",
                &self.login_password.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

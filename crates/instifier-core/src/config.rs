use std::path::PathBuf;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn invalid(var: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can pass a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e))
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = parse_usize(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1"));
        }
        Ok(value)
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => parse_flag(&raw).ok_or_else(|| invalid(var, format!("not a boolean: {raw}"))),
        }
    };

    let parse_url = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        let trimmed = raw.trim().trim_end_matches('/').to_string();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(trimmed)
        } else {
            Err(invalid(var, "must start with http:// or https://"))
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("INSTIFIER_ENV", "development"))?;
    let log_level = or_default("INSTIFIER_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("INSTIFIER_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("INSTIFIER_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("INSTIFIER_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_endpoint_base =
        parse_url("INSTIFIER_SCRAPER_ENDPOINT_BASE", "https://i.instagram.com")?;
    let scraper_site_base = parse_url("INSTIFIER_SCRAPER_SITE_BASE", "https://www.instagram.com")?;
    let scraper_app_id = or_default("INSTIFIER_SCRAPER_APP_ID", "936619743392459");
    let scraper_user_agent = or_default("INSTIFIER_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_request_timeout_secs = parse_u64("INSTIFIER_SCRAPER_REQUEST_TIMEOUT_SECS", "20")?;
    let scraper_max_retries = parse_u32("INSTIFIER_SCRAPER_MAX_RETRIES", "2")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("INSTIFIER_SCRAPER_RETRY_BACKOFF_BASE_SECS", "2")?;
    let scraper_max_posts = parse_usize("INSTIFIER_SCRAPER_MAX_POSTS", "12")?;
    let scraper_max_concurrent_profiles =
        parse_positive_usize("INSTIFIER_SCRAPER_MAX_CONCURRENT_PROFILES", "2")?;
    let scraper_unit_timeout_secs = parse_u64("INSTIFIER_SCRAPER_UNIT_TIMEOUT_SECS", "300")?;
    let scraper_freshness_hours = parse_u64("INSTIFIER_SCRAPER_FRESHNESS_HOURS", "24")?;

    let browser_headless = parse_bool("INSTIFIER_BROWSER_HEADLESS", true)?;
    let browser_chrome_path = optional("INSTIFIER_BROWSER_CHROME_PATH").map(PathBuf::from);
    let browser_navigation_timeout_ms =
        parse_u64("INSTIFIER_BROWSER_NAVIGATION_TIMEOUT_MS", "30000")?;
    let browser_selector_timeout_ms = parse_u64("INSTIFIER_BROWSER_SELECTOR_TIMEOUT_MS", "15000")?;
    let browser_post_timeout_ms = parse_u64("INSTIFIER_BROWSER_POST_TIMEOUT_MS", "15000")?;
    let browser_login_timeout_ms = parse_u64("INSTIFIER_BROWSER_LOGIN_TIMEOUT_MS", "30000")?;
    let browser_two_factor_wait_ms = parse_u64("INSTIFIER_BROWSER_TWO_FACTOR_WAIT_MS", "5000")?;
    let browser_navigation_retries = parse_u32("INSTIFIER_BROWSER_NAVIGATION_RETRIES", "1")?;
    let browser_navigation_retry_delay_ms =
        parse_u64("INSTIFIER_BROWSER_NAVIGATION_RETRY_DELAY_MS", "2000")?;

    let debug_dir = PathBuf::from(or_default("INSTIFIER_DEBUG_DIR", "./debug"));
    let login_username = optional("INSTIFIER_LOGIN_USERNAME");
    let login_password = optional("INSTIFIER_LOGIN_PASSWORD");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_endpoint_base,
        scraper_site_base,
        scraper_app_id,
        scraper_user_agent,
        scraper_request_timeout_secs,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        scraper_max_posts,
        scraper_max_concurrent_profiles,
        scraper_unit_timeout_secs,
        scraper_freshness_hours,
        browser_headless,
        browser_chrome_path,
        browser_navigation_timeout_ms,
        browser_selector_timeout_ms,
        browser_post_timeout_ms,
        browser_login_timeout_ms,
        browser_two_factor_wait_ms,
        browser_navigation_retries,
        browser_navigation_retry_delay_ms,
        debug_dir,
        login_username,
        login_password,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(invalid(
            "INSTIFIER_ENV",
            format!("unknown environment \"{other}\""),
        )),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

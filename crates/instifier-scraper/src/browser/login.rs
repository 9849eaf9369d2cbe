//! Login form sub-protocol.

use std::time::Duration;

use instifier_core::Credentials;
use tokio::time::Instant;

use crate::config::BrowserSettings;
use crate::error::ScraperError;
use crate::page::PageQuery;

const LOGIN_PATH: &str = "/accounts/login/";
const USERNAME_INPUT: &str = "input[name='username']";
const PASSWORD_INPUT: &str = "input[name='password']";
const SUBMIT_BUTTON: &str = "button[type='submit']";
const VERIFICATION_INPUT: &str = "input[name='verificationCode']";
const DISMISS_BUTTONS: &str = "button, div[role='button']";
const DISMISS_TEXT: &str = "Not Now";

const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What the login page showed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginScreen {
    Form,
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoginOutcome {
    Authenticated,
    AuthFailed(String),
    TwoFactorRequired,
}

/// Drives the login form. Never returns an error: every failure is an
/// `AuthFailed` outcome carrying the reason.
pub(crate) async fn log_in(
    page: &dyn PageQuery,
    credentials: &Credentials,
    site_base: &str,
    settings: &BrowserSettings,
) -> LoginOutcome {
    let login_url = format!("{}{LOGIN_PATH}", site_base.trim_end_matches('/'));
    if let Err(e) = page.goto(&login_url, settings.navigation_timeout).await {
        return LoginOutcome::AuthFailed(format!("login page did not load: {e}"));
    }

    match first_login_screen(page, settings.login_timeout).await {
        Ok(Some(LoginScreen::Form)) => dismiss_prompt(page).await,
        Ok(Some(LoginScreen::Prompt)) => {
            dismiss_prompt(page).await;
            match page.wait_for(USERNAME_INPUT, settings.login_timeout).await {
                Ok(true) => {}
                Ok(false) => {
                    return LoginOutcome::AuthFailed(
                        "login form never appeared after dismissing prompt".to_owned(),
                    );
                }
                Err(e) => return LoginOutcome::AuthFailed(e.to_string()),
            }
        }
        Ok(None) => return LoginOutcome::AuthFailed("login form never appeared".to_owned()),
        Err(e) => return LoginOutcome::AuthFailed(e.to_string()),
    }
    pause(settings).await;

    for (selector, value) in [
        (USERNAME_INPUT, credentials.login.as_str()),
        (PASSWORD_INPUT, credentials.secret.as_str()),
    ] {
        match page.fill(selector, value).await {
            Ok(true) => {}
            Ok(false) => {
                return LoginOutcome::AuthFailed(format!("field {selector} not found"));
            }
            Err(e) => return LoginOutcome::AuthFailed(e.to_string()),
        }
        pause(settings).await;
    }

    match page.click(SUBMIT_BUTTON, 0).await {
        Ok(true) => {}
        Ok(false) => return LoginOutcome::AuthFailed("submit button not found".to_owned()),
        Err(e) => return LoginOutcome::AuthFailed(e.to_string()),
    }

    if matches!(
        page.wait_for(VERIFICATION_INPUT, settings.two_factor_wait).await,
        Ok(true)
    ) {
        return LoginOutcome::TwoFactorRequired;
    }

    if !left_login_page(page, settings.login_timeout).await {
        return LoginOutcome::AuthFailed("still on the login page after submit".to_owned());
    }

    // "Save your login info?" prompt
    dismiss_prompt(page).await;
    LoginOutcome::Authenticated
}

/// Polls until the username input or a "Not Now" interstitial is showing,
/// whichever comes first. `None` once `timeout` passes with neither.
async fn first_login_screen(
    page: &dyn PageQuery,
    timeout: Duration,
) -> Result<Option<LoginScreen>, ScraperError> {
    let deadline = Instant::now() + timeout;
    loop {
        if page.count(USERNAME_INPUT).await? > 0 {
            return Ok(Some(LoginScreen::Form));
        }
        if page.contains_text(DISMISS_BUTTONS, DISMISS_TEXT).await? {
            return Ok(Some(LoginScreen::Prompt));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(URL_POLL_INTERVAL).await;
    }
}

async fn left_login_page(page: &dyn PageQuery, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match page.current_url().await {
            Ok(url) if !url.contains(LOGIN_PATH) => return true,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "could not read url while waiting for login");
                return false;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(URL_POLL_INTERVAL).await;
    }
}

async fn dismiss_prompt(page: &dyn PageQuery) {
    if let Err(e) = page.click_text(DISMISS_BUTTONS, DISMISS_TEXT).await {
        tracing::debug!(error = %e, "dismiss prompt failed");
    }
}

/// Randomized pause between form actions.
async fn pause(settings: &BrowserSettings) {
    let (min, max) = settings.action_pause_ms;
    let millis = if max > min {
        rand::random_range(min..=max)
    } else {
        min
    };
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

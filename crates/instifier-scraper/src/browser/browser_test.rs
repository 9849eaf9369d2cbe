use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::testing::{lock, ClickEffect, FakeDom, FakeElement, FakeLauncher, MemorySessions};

const SITE: &str = "https://www.instagram.com";
const PROFILE: &str = "https://www.instagram.com/someone/";
const LOGIN: &str = "https://www.instagram.com/accounts/login/";

struct CountingExtractor {
    calls: AtomicUsize,
}

impl CountingExtractor {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageExtractor for CountingExtractor {
    async fn extract(
        &self,
        _page: &dyn PageQuery,
        username: &str,
    ) -> Result<ProfileRecord, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProfileRecord::new(username, Source::Dom))
    }
}

fn settings(debug_dir: &str) -> BrowserSettings {
    BrowserSettings {
        login_timeout: Duration::ZERO,
        two_factor_wait: Duration::ZERO,
        navigation_retries: 2,
        navigation_retry_delay: Duration::ZERO,
        action_pause_ms: (0, 0),
        debug_dir: std::env::temp_dir().join(format!(
            "instifier-{debug_dir}-{}",
            std::process::id()
        )),
        ..BrowserSettings::default()
    }
}

fn controller(dom: &Arc<Mutex<FakeDom>>, label: &str) -> BrowserController<FakeLauncher> {
    BrowserController::new(FakeLauncher::new(Arc::clone(dom)), settings(label), SITE)
}

fn profile_page(body: &str) -> Arc<Mutex<FakeDom>> {
    let dom = FakeDom::shared();
    {
        let mut d = lock(&dom);
        d.put(PROFILE, "main", vec![FakeElement::default()]);
        d.put(PROFILE, "body", vec![FakeElement::text(body)]);
    }
    dom
}

fn login_form(dom: &Arc<Mutex<FakeDom>>, two_factor: bool, submit_leaves: bool) {
    let mut d = lock(dom);
    for selector in [
        "input[name='username']",
        "input[name='password']",
        "button[type='submit']",
    ] {
        d.put(LOGIN, selector, vec![FakeElement::default()]);
    }
    if two_factor {
        d.put(LOGIN, "input[name='verificationCode']", vec![FakeElement::default()]);
    }
    if submit_leaves {
        d.clicks.insert(
            "button[type='submit']".to_owned(),
            ClickEffect::Navigate(format!("{SITE}/")),
        );
    }
}

fn credentials() -> Credentials {
    Credentials::new("scout", "hunter2")
}

#[tokio::test]
async fn ready_profile_is_handed_to_extractor() {
    let dom = profile_page("Some One 120 posts");
    let extractor = CountingExtractor::new();

    let record = controller(&dom, "ready")
        .run("someone", None, &extractor)
        .await
        .unwrap();

    assert_eq!(record.username, "someone");
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    let d = lock(&dom);
    assert!(d.fingerprinted);
    assert!(d.closed);
}

#[tokio::test]
async fn login_wall_is_blocked_without_extraction() {
    let dom = profile_page("Log in to see photos and videos from friends.");
    let extractor = CountingExtractor::new();

    let err = controller(&dom, "wall")
        .run("someone", None, &extractor)
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::Blocked { .. }));
    assert!(err.is_not_found());
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(lock(&dom).closed);
}

#[tokio::test]
async fn unavailable_page_is_not_found() {
    let dom = profile_page("Sorry, this page isn't available.");
    let extractor = CountingExtractor::new();

    let err = controller(&dom, "missing")
        .run("someone", None, &extractor)
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::NotFound { .. }));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(lock(&dom).closed);
}

#[tokio::test]
async fn login_then_profile() {
    let dom = profile_page("Some One");
    login_form(&dom, false, true);
    let extractor = CountingExtractor::new();

    controller(&dom, "login")
        .run("someone", Some(&credentials()), &extractor)
        .await
        .unwrap();

    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    let d = lock(&dom);
    assert!(d.calls.contains(&"fill:input[name='password']".to_owned()));
    assert!(d.calls.contains(&format!("goto:{PROFILE}")));
}

#[tokio::test]
async fn not_now_prompt_is_dismissed_before_login_form() {
    const DISMISS: &str = "button, div[role='button']";
    let dom = profile_page("Some One");
    {
        let mut d = lock(&dom);
        d.put(LOGIN, DISMISS, vec![FakeElement::text("Not Now")]);
        d.clicks.insert(
            format!("{DISMISS}|Not Now"),
            ClickEffect::Reveal(
                [
                    "input[name='username']",
                    "input[name='password']",
                    "button[type='submit']",
                ]
                .into_iter()
                .map(|selector| (selector.to_owned(), vec![FakeElement::default()]))
                .collect(),
            ),
        );
        d.clicks.insert(
            "button[type='submit']".to_owned(),
            ClickEffect::Navigate(format!("{SITE}/")),
        );
    }
    let extractor = CountingExtractor::new();

    controller(&dom, "not-now")
        .run("someone", Some(&credentials()), &extractor)
        .await
        .unwrap();

    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    let d = lock(&dom);
    let position = |call: &str| d.calls.iter().position(|c| c == call);
    let dismissed = position(&format!("click_text:{DISMISS}")).unwrap();
    let filled = position("fill:input[name='username']").unwrap();
    assert!(dismissed < filled);
}

#[tokio::test]
async fn verification_prompt_abandons_login() {
    let dom = profile_page("Some One");
    login_form(&dom, true, false);
    let extractor = CountingExtractor::new();

    let err = controller(&dom, "two-factor")
        .run("someone", Some(&credentials()), &extractor)
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::TwoFactorRequired));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    let d = lock(&dom);
    assert!(d.closed);
    assert!(!d.calls.contains(&format!("goto:{PROFILE}")));
}

#[tokio::test]
async fn staying_on_login_page_is_auth_failure() {
    let dom = profile_page("Some One");
    login_form(&dom, false, false);
    let extractor = CountingExtractor::new();

    let err = controller(&dom, "auth-failed")
        .run("someone", Some(&credentials()), &extractor)
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::AuthFailed { .. }));
    assert!(lock(&dom).closed);
}

#[tokio::test]
async fn navigation_retries_then_writes_snapshot() {
    let dom = profile_page("Some One");
    lock(&dom).unreachable.insert(PROFILE.to_owned());
    let controller = controller(&dom, "nav-error");
    let snapshot_dir = controller.settings().debug_dir.join("someone");
    let extractor = CountingExtractor::new();

    let err = controller
        .run("someone", None, &extractor)
        .await
        .unwrap_err();

    assert!(matches!(err, ScraperError::Timeout { .. }));
    {
        let d = lock(&dom);
        assert_eq!(d.goto_attempts, 3);
        assert_eq!(d.screenshots, 1);
        assert!(d.closed);
    }
    assert!(snapshot_dir.join("navigation-error.png").exists());
    assert!(snapshot_dir.join("navigation-error.html").exists());

    let _ = std::fs::remove_dir_all(&controller.settings().debug_dir);
}

#[tokio::test]
async fn refresh_reads_session_cookie() {
    let dom = FakeDom::shared();
    login_form(&dom, false, true);
    lock(&dom)
        .cookies
        .insert("sessionid".to_owned(), "tok-42".to_owned());

    let token = controller(&dom, "refresh")
        .refresh_session(&credentials())
        .await
        .unwrap();

    assert_eq!(token.as_ref().map(SessionToken::as_str), Some("tok-42"));
    assert!(lock(&dom).closed);
}

#[tokio::test]
async fn refresh_without_cookie_is_none() {
    let dom = FakeDom::shared();
    login_form(&dom, false, true);

    let token = controller(&dom, "refresh-empty")
        .refresh_session(&credentials())
        .await
        .unwrap();

    assert!(token.is_none());
}

#[tokio::test]
async fn refreshed_token_is_saved_to_session_store() {
    let dom = FakeDom::shared();
    login_form(&dom, false, true);
    lock(&dom)
        .cookies
        .insert("sessionid".to_owned(), "tok-7".to_owned());
    let sessions = MemorySessions::holding("stale");

    let saved = controller(&dom, "refresh-store")
        .refresh_into(&credentials(), &sessions)
        .await
        .unwrap();

    assert!(saved);
    assert_eq!(
        sessions.current().as_ref().map(SessionToken::as_str),
        Some("tok-7")
    );
}

#[tokio::test]
async fn missing_cookie_leaves_stored_token() {
    let dom = FakeDom::shared();
    login_form(&dom, false, true);
    let sessions = MemorySessions::holding("kept");

    let saved = controller(&dom, "refresh-keep")
        .refresh_into(&credentials(), &sessions)
        .await
        .unwrap();

    assert!(!saved);
    assert_eq!(
        sessions.current().as_ref().map(SessionToken::as_str),
        Some("kept")
    );
}

#[tokio::test]
async fn strategy_reports_dom_source() {
    let dom = profile_page("Some One");
    let settings = settings("strategy");
    let extractor = DomExtractor::new(SITE, 12, &settings);
    let strategy = BrowserStrategy::new(
        BrowserController::new(FakeLauncher::new(Arc::clone(&dom)), settings, SITE),
        extractor,
    );

    assert_eq!(strategy.source(), Source::Dom);
    assert_eq!(strategy.controller().site_base(), SITE);
    assert_eq!(SessionState::TwoFactorRequired.as_str(), "two_factor_required");
}

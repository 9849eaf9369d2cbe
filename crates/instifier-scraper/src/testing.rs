//! In-memory doubles for pages, launchers, strategies, and stores.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instifier_core::{ProfileRecord, SessionToken, Source};

use crate::error::ScraperError;
use crate::orchestrator::{FetchContext, ProfileSource, ProfileStore, SessionStore};
use crate::page::{BrowserPage, Launcher, PageQuery, TextFragment};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeElement {
    pub text: String,
    pub container: String,
    pub attrs: Vec<(String, String)>,
}

impl FakeElement {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }

    pub fn in_container(mut self, container: &str) -> Self {
        self.container = container.to_owned();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_owned(), value.to_owned()));
        self
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ClickEffect {
    Navigate(String),
    /// Adds elements to the current page until the next Escape.
    Reveal(Vec<(String, Vec<FakeElement>)>),
}

type Elements = HashMap<String, Vec<FakeElement>>;

/// Page state shared between a test and the fake page it hands out.
#[derive(Debug, Default)]
pub(crate) struct FakeDom {
    pub url: String,
    pub history: Vec<String>,
    pub pages: HashMap<String, Elements>,
    pub failing: HashSet<String>,
    pub unreachable: HashSet<String>,
    pub clicks: HashMap<String, ClickEffect>,
    pub cookies: HashMap<String, String>,
    pub calls: Vec<String>,
    pub revealed: Vec<(String, String)>,
    pub goto_attempts: usize,
    pub fingerprinted: bool,
    pub screenshots: usize,
    pub closed: bool,
}

impl FakeDom {
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Adds `elements` under `selector` on the page at `url`.
    pub fn put(&mut self, url: &str, selector: &str, elements: Vec<FakeElement>) {
        self.pages
            .entry(url.to_owned())
            .or_default()
            .entry(selector.to_owned())
            .or_default()
            .extend(elements);
    }

    fn current(&self, selector: &str) -> Vec<FakeElement> {
        self.pages
            .get(&self.url)
            .and_then(|page| page.get(selector))
            .cloned()
            .unwrap_or_default()
    }

    fn check(&mut self, op: &str, selector: &str) -> Result<(), ScraperError> {
        self.calls.push(format!("{op}:{selector}"));
        if self.failing.contains(selector) {
            return Err(ScraperError::Browser(format!("query failed: {selector}")));
        }
        Ok(())
    }

    fn apply(&mut self, effect: ClickEffect) {
        match effect {
            ClickEffect::Navigate(url) => {
                let previous = std::mem::replace(&mut self.url, url);
                self.history.push(previous);
            }
            ClickEffect::Reveal(groups) => {
                let url = self.url.clone();
                for (selector, elements) in groups {
                    self.put(&url, &selector, elements);
                    self.revealed.push((url.clone(), selector));
                }
            }
        }
    }

    fn escape(&mut self) {
        if self.revealed.is_empty() {
            self.back();
            return;
        }
        for (url, selector) in std::mem::take(&mut self.revealed) {
            if let Some(page) = self.pages.get_mut(&url) {
                page.remove(&selector);
            }
        }
    }

    fn back(&mut self) {
        if let Some(previous) = self.history.pop() {
            self.url = previous;
        }
    }
}

pub(crate) fn lock(dom: &Arc<Mutex<FakeDom>>) -> MutexGuard<'_, FakeDom> {
    dom.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) struct FakePage {
    dom: Arc<Mutex<FakeDom>>,
}

impl FakePage {
    pub fn new(dom: Arc<Mutex<FakeDom>>) -> Self {
        Self { dom }
    }
}

#[async_trait]
impl PageQuery for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        let mut dom = lock(&self.dom);
        dom.calls.push(format!("goto:{url}"));
        dom.goto_attempts += 1;
        if dom.unreachable.contains(url) {
            return Err(ScraperError::Timeout {
                step: format!("navigation to {url}"),
                millis: 1,
            });
        }
        let previous = std::mem::replace(&mut dom.url, url.to_owned());
        if !previous.is_empty() {
            dom.history.push(previous);
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(lock(&self.dom).url.clone())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<bool, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("wait_for", selector)?;
        Ok(!dom.current(selector).is_empty())
    }

    async fn count(&self, selector: &str) -> Result<usize, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("count", selector)?;
        Ok(dom.current(selector).len())
    }

    async fn contains_text(&self, selector: &str, needle: &str) -> Result<bool, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("contains_text", selector)?;
        Ok(dom.current(selector).iter().any(|e| e.text.contains(needle)))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("texts", selector)?;
        Ok(dom
            .current(selector)
            .into_iter()
            .map(|e| e.text.trim().to_owned())
            .collect())
    }

    async fn fragments(&self, selector: &str) -> Result<Vec<TextFragment>, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("fragments", selector)?;
        Ok(dom
            .current(selector)
            .into_iter()
            .map(|e| TextFragment {
                text: e.text,
                container: e.container,
            })
            .collect())
    }

    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<String>, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("attributes", selector)?;
        Ok(dom
            .current(selector)
            .iter()
            .filter_map(|e| e.get(name).map(str::to_owned))
            .collect())
    }

    async fn click(&self, selector: &str, index: usize) -> Result<bool, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("click", selector)?;
        if dom.current(selector).len() <= index {
            return Ok(false);
        }
        if let Some(effect) = dom.clicks.get(selector).cloned() {
            dom.apply(effect);
        }
        Ok(true)
    }

    async fn click_text(&self, selector: &str, text: &str) -> Result<bool, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("click_text", selector)?;
        let needle = text.to_lowercase();
        let found = dom
            .current(selector)
            .iter()
            .any(|e| e.text.to_lowercase().contains(&needle));
        if !found {
            return Ok(false);
        }
        if let Some(effect) = dom.clicks.get(&format!("{selector}|{text}")).cloned() {
            dom.apply(effect);
        }
        Ok(true)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<bool, ScraperError> {
        let mut dom = lock(&self.dom);
        dom.check("fill", selector)?;
        dom.calls.push(format!("typed:{}", value.len()));
        Ok(!dom.current(selector).is_empty())
    }

    async fn press_escape(&self) -> Result<(), ScraperError> {
        let mut dom = lock(&self.dom);
        dom.calls.push("escape".to_owned());
        dom.escape();
        Ok(())
    }

    async fn go_back(&self) -> Result<(), ScraperError> {
        let mut dom = lock(&self.dom);
        dom.calls.push("back".to_owned());
        dom.back();
        Ok(())
    }

    async fn release_overlays(&self) -> Result<(), ScraperError> {
        lock(&self.dom).calls.push("release_overlays".to_owned());
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn apply_fingerprint(
        &self,
        _user_agent: &str,
        _init_script: &str,
    ) -> Result<(), ScraperError> {
        lock(&self.dom).fingerprinted = true;
        Ok(())
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(format!("<html data-url=\"{}\"></html>", lock(&self.dom).url))
    }

    async fn screenshot(&self, path: &Path) -> Result<(), ScraperError> {
        lock(&self.dom).screenshots += 1;
        tokio::fs::write(path, b"png")
            .await
            .map_err(|e| ScraperError::Browser(e.to_string()))
    }

    async fn cookie(&self, name: &str) -> Result<Option<String>, ScraperError> {
        Ok(lock(&self.dom).cookies.get(name).cloned())
    }

    fn as_query(&self) -> &dyn PageQuery {
        self
    }

    async fn close(self: Box<Self>) -> Result<(), ScraperError> {
        lock(&self.dom).closed = true;
        Ok(())
    }
}

pub(crate) struct FakeLauncher {
    pub dom: Arc<Mutex<FakeDom>>,
    pub launches: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(dom: Arc<Mutex<FakeDom>>) -> Self {
        Self {
            dom,
            launches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>, ScraperError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage::new(Arc::clone(&self.dom))))
    }
}

/// How a scripted strategy answers for one username.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Record(ProfileRecord),
    NotFound,
    SessionExpired,
    Unavailable,
    Panic,
    Hang,
}

/// Strategy double that answers from a script and counts calls.
pub(crate) struct ScriptedSource {
    source: Source,
    script: HashMap<String, Scripted>,
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallback: Scripted,
    delay: Duration,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub seen_sessions: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    pub fn new(source: Source, fallback: Scripted) -> Self {
        Self {
            source,
            script: HashMap::new(),
            queued: Mutex::new(HashMap::new()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            seen_sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, username: &str, answer: Scripted) -> Self {
        self.script.insert(username.to_owned(), answer);
        self
    }

    /// One-shot answer for `username`, used before the standing script.
    /// Queued answers are consumed in the order they were added.
    pub fn then(self, username: &str, answer: Scripted) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(username.to_owned())
            .or_default()
            .push_back(answer);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileSource for ScriptedSource {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<ProfileRecord, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(ctx.session.map(|s| s.as_str().to_owned()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let queued = self
            .queued
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get_mut(ctx.username)
            .and_then(VecDeque::pop_front);
        let answer = queued
            .or_else(|| self.script.get(ctx.username).cloned())
            .unwrap_or_else(|| self.fallback.clone());
        match answer {
            Scripted::Record(mut record) => {
                record.username = ctx.username.to_owned();
                record.source = self.source;
                Ok(record)
            }
            Scripted::NotFound => Err(ScraperError::NotFound {
                username: ctx.username.to_owned(),
            }),
            Scripted::SessionExpired => Err(ScraperError::SessionExpired {
                username: ctx.username.to_owned(),
            }),
            Scripted::Unavailable => Err(ScraperError::UnexpectedStatus {
                status: 500,
                url: "http://fake".to_owned(),
            }),
            Scripted::Panic => panic!("scripted panic for {}", ctx.username),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ScraperError::Browser("unreachable".to_owned()))
            }
        }
    }
}

/// Profile store keeping the latest record per username.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub records: Mutex<HashMap<String, ProfileRecord>>,
    pub upserts: AtomicUsize,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn with_scraped_at(username: &str, scraped_at: DateTime<Utc>) -> Self {
        let store = Self::default();
        let mut record = ProfileRecord::new(username, Source::StructuredEndpoint);
        record.scraped_at = scraped_at;
        store
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(record.username.clone(), record);
        store
    }

    pub fn get(&self, username: &str) -> Option<ProfileRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(username)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_scraped_at(
        &self,
        username: &str,
    ) -> Result<Option<DateTime<Utc>>, ScraperError> {
        Ok(self.get(username).map(|r| r.scraped_at))
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), ScraperError> {
        if self.fail_writes {
            return Err(ScraperError::Store {
                reason: "write refused".to_owned(),
            });
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(record.username.clone(), record.clone());
        Ok(())
    }
}

/// Session store holding at most one token.
#[derive(Default)]
pub(crate) struct MemorySessions {
    pub token: Mutex<Option<SessionToken>>,
    pub clears: AtomicUsize,
}

impl MemorySessions {
    pub fn holding(value: &str) -> Self {
        Self {
            token: Mutex::new(SessionToken::new(value)),
            clears: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> Option<SessionToken> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn load(&self) -> Result<Option<SessionToken>, ScraperError> {
        Ok(self.current())
    }

    async fn save(&self, token: &SessionToken) -> Result<(), ScraperError> {
        *self
            .token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ScraperError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self
            .token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

#[async_trait]
impl<'a> ProfileSource for &'a ScriptedSource {
    fn source(&self) -> Source {
        (**self).source()
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<ProfileRecord, ScraperError> {
        (**self).fetch(ctx).await
    }
}

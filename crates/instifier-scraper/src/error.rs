use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain}")]
    RateLimited {
        domain: String,
        /// Seconds from the `Retry-After` header, when the server sent one.
        retry_after_secs: Option<u64>,
    },

    #[error("profile not found: {username}")]
    NotFound { username: String },

    #[error("login wall shown for {username}")]
    Blocked { username: String },

    #[error("login failed: {reason}")]
    AuthFailed { reason: String },

    #[error("login requires a verification code")]
    TwoFactorRequired,

    #[error("session token rejected for {username}")]
    SessionExpired { username: String },

    #[error("timed out after {millis}ms waiting for {step}")]
    Timeout { step: String, millis: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("store error: {reason}")]
    Store { reason: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid {name} header: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    #[error("invalid username \"{username}\"")]
    InvalidUsername { username: String },
}

impl ScraperError {
    /// `true` for failures that mean the profile itself is unavailable, as
    /// opposed to a transport or tooling problem.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Blocked { .. })
    }

    /// `true` for transient endpoint failures worth another attempt: 429 and
    /// network-level errors.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Http(_))
    }
}

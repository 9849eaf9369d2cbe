pub mod browser;
pub mod config;
pub mod dom;
pub mod endpoint;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod page;
pub(crate) mod rate_limit;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::{BrowserController, BrowserStrategy, ChromiumLauncher, SessionState};
pub use config::{BrowserSettings, ScraperConfig};
pub use dom::{DomExtractor, PageExtractor};
pub use endpoint::EndpointClient;
pub use error::ScraperError;
pub use normalize::{
    location_from_bio, month_year, parse_abbreviated_count, parse_timestamp, to_iso8601,
};
pub use orchestrator::{
    batch_usernames, is_fresh, validate_username, AcquireOutcome, AcquireRequest, AcquireSettings,
    Acquirer, BatchReport, FetchContext, NoSessions, ProfileSource, ProfileStore, SessionStore,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Posts kept per profile unless configured otherwise.
pub const DEFAULT_MAX_POSTS: usize = 12;

/// Account classification shown on a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    Personal,
    Creator,
    Business,
}

impl AccountType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Creator => "Creator",
            Self::Business => "Business",
        }
    }

    /// Parses the stored label. Unknown labels fall back to `Personal`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "Business" => Self::Business,
            "Creator" => Self::Creator,
            _ => Self::Personal,
        }
    }
}

/// Which strategy produced a record.
///
/// `Hybrid` is accepted when reading stored records; no strategy emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    StructuredEndpoint,
    Dom,
    Hybrid,
}

impl Source {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StructuredEndpoint => "structured_endpoint",
            Self::Dom => "dom",
            Self::Hybrid => "hybrid",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "structured_endpoint" => Some(Self::StructuredEndpoint),
            "dom" => Some(Self::Dom),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One post from the profile grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Shortcode or numeric media id, when the source exposes one.
    pub id: Option<String>,
    pub url: String,
    pub media_url: String,
    pub is_video: bool,
    pub like_count: u64,
    pub comment_count: u64,
    /// Only counted toward engagement when `is_video` is set.
    pub video_view_count: u64,
    pub caption: String,
    pub timestamp: DateTime<Utc>,
}

impl PostRecord {
    /// Interactions this post contributes to the engagement total.
    #[must_use]
    pub fn interactions(&self) -> u64 {
        let views = if self.is_video {
            self.video_view_count
        } else {
            0
        };
        self.like_count
            .saturating_add(self.comment_count)
            .saturating_add(views)
    }
}

/// Canonical profile shape produced by every acquisition strategy.
///
/// Fields a strategy could not read hold zero-values (`0`, `""`, `None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub username: String,
    pub display_name: String,
    pub account_type: AccountType,
    pub bio: String,
    pub location: String,
    pub profile_url: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub date_joined: Option<String>,
    pub posts: Vec<PostRecord>,
    pub engagement_rate: f64,
    pub scraped_at: DateTime<Utc>,
    pub source: Source,
}

impl ProfileRecord {
    /// A record for `username` with every field at its zero-value.
    #[must_use]
    pub fn new(username: &str, source: Source) -> Self {
        Self {
            username: normalize_username(username),
            display_name: String::new(),
            account_type: AccountType::Personal,
            bio: String::new(),
            location: String::new(),
            profile_url: String::new(),
            follower_count: 0,
            following_count: 0,
            post_count: 0,
            date_joined: None,
            posts: Vec::new(),
            engagement_rate: 0.0,
            scraped_at: DateTime::<Utc>::UNIX_EPOCH,
            source,
        }
    }

    /// Canonical profile URL on `site_base`, e.g. `https://www.instagram.com/name/`.
    #[must_use]
    pub fn profile_url_for(site_base: &str, username: &str) -> String {
        format!("{}/{}/", site_base.trim_end_matches('/'), username)
    }

    /// Caps `posts` at `max_posts`, recomputes `engagement_rate`, and stamps
    /// `scraped_at`.
    pub fn finalize(&mut self, max_posts: usize, scraped_at: DateTime<Utc>) {
        self.posts.truncate(max_posts);
        self.engagement_rate = engagement_rate(&self.posts, self.follower_count);
        self.scraped_at = scraped_at;
    }
}

/// Lowercases, trims, and strips a leading `@`.
#[must_use]
pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_lowercase()
}

/// Percentage of followers that interacted with `posts`, rounded to two
/// decimals. Zero followers yields `0.0`.
///
/// Integer arithmetic up to the final division, so `365 / 5000` is exactly `7.3`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_rate(posts: &[PostRecord], follower_count: u64) -> f64 {
    if follower_count == 0 {
        return 0.0;
    }
    let total: u128 = posts.iter().map(|p| u128::from(p.interactions())).sum();
    let followers = u128::from(follower_count);
    // hundredths of a percent, rounded half up
    let hundredths = (total * 20_000 + followers) / (followers * 2);
    hundredths as f64 / 100.0
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;

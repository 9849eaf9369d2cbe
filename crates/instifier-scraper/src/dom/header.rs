//! Profile header fields.

use instifier_core::{AccountType, ProfileRecord};

use super::selectors::{
    BIO_SPANS, DIALOG, DIALOG_BUTTONS, DIALOG_SPANS, DISPLAY_NAME, GRID_TIMES, HEADER, LOCATION,
    OPTIONS_BUTTON, SHOP_LINK, STAT_ITEMS,
};
use super::{isolated, return_to_profile, DomExtractor};
use crate::error::ScraperError;
use crate::normalize::{location_from_bio, month_year, parse_abbreviated_count, parse_timestamp};
use crate::page::PageQuery;

const STAT_KEYWORDS: [&str; 3] = ["posts", "followers", "following"];
const ABOUT_ACCOUNT: &str = "About this account";
const DATE_JOINED: &str = "Date joined";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct HeaderStats {
    pub posts: u64,
    pub followers: u64,
    pub following: u64,
}

pub(super) async fn extract_header(
    page: &dyn PageQuery,
    record: &mut ProfileRecord,
    extractor: &DomExtractor,
) {
    let username = record.username.clone();

    record.display_name = isolated("display_name", &username, display_name(page)).await;
    record.bio = isolated("bio", &username, bio(page, &username)).await;

    let stats = isolated("stats", &username, stats(page)).await;
    record.post_count = stats.posts;
    record.follower_count = stats.followers;
    record.following_count = stats.following;

    record.account_type = isolated("account_type", &username, account_type(page)).await;
    record.location = isolated("location", &username, location(page, &record.bio)).await;
    record.date_joined = isolated(
        "date_joined",
        &username,
        date_joined(page, &record.profile_url, extractor),
    )
    .await;
    if record.date_joined.is_none() {
        record.date_joined = isolated("date_joined", &username, grid_joined(page)).await;
    }
}

async fn display_name(page: &dyn PageQuery) -> Result<String, ScraperError> {
    Ok(page.text(DISPLAY_NAME).await?.unwrap_or_default())
}

async fn bio(page: &dyn PageQuery, username: &str) -> Result<String, ScraperError> {
    let fragments = page.fragments(BIO_SPANS).await?;
    let mut lines: Vec<String> = Vec::new();
    for fragment in fragments {
        let text = fragment.text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case(username) {
            continue;
        }
        let container = fragment.container.to_lowercase();
        if STAT_KEYWORDS.iter().any(|k| container.contains(k)) {
            continue;
        }
        // nested spans repeat their parent's text
        if lines.last().is_some_and(|last| last == text) {
            continue;
        }
        lines.push(text.to_owned());
    }
    Ok(lines.join("\n"))
}

async fn stats(page: &dyn PageQuery) -> Result<HeaderStats, ScraperError> {
    Ok(classify_stats(&page.texts(STAT_ITEMS).await?))
}

pub(super) fn classify_stats(items: &[String]) -> HeaderStats {
    let mut stats = HeaderStats::default();
    for item in items {
        let lower = item.to_lowercase();
        let value = parse_abbreviated_count(&lower);
        if lower.contains("following") {
            stats.following = value;
        } else if lower.contains("follower") {
            stats.followers = value;
        } else if lower.contains("post") {
            stats.posts = value;
        }
    }
    stats
}

async fn account_type(page: &dyn PageQuery) -> Result<AccountType, ScraperError> {
    if page.contains_text(HEADER, "Professional").await? {
        return Ok(AccountType::Creator);
    }
    if page.contains_text(HEADER, "Business").await? {
        return Ok(AccountType::Business);
    }
    if page.count(SHOP_LINK).await? > 0 {
        return Ok(AccountType::Business);
    }
    Ok(AccountType::Personal)
}

async fn location(page: &dyn PageQuery, bio: &str) -> Result<String, ScraperError> {
    match page.text(LOCATION).await? {
        Some(text) => Ok(text),
        None => Ok(location_from_bio(bio)),
    }
}

/// Reads "Date joined" from the about-this-account panel.
async fn date_joined(
    page: &dyn PageQuery,
    profile_url: &str,
    extractor: &DomExtractor,
) -> Result<Option<String>, ScraperError> {
    if !page.click(OPTIONS_BUTTON, 0).await? {
        return Ok(None);
    }

    let mut joined = None;
    if page.click_text(DIALOG_BUTTONS, ABOUT_ACCOUNT).await?
        && page.wait_for(DIALOG, extractor.selector_timeout).await?
    {
        joined = page
            .fragments(DIALOG_SPANS)
            .await?
            .into_iter()
            .find(|f| {
                f.container.contains(DATE_JOINED)
                    && !f.text.is_empty()
                    && !f.text.contains(DATE_JOINED)
            })
            .map(|f| f.text);
    }

    page.press_escape().await?;
    if page.count(DIALOG).await? > 0 {
        page.press_escape().await?;
    }
    return_to_profile(page, profile_url, extractor.navigation_timeout).await?;
    Ok(joined)
}

/// Oldest timestamp visible on the post grid, as month and year.
async fn grid_joined(page: &dyn PageQuery) -> Result<Option<String>, ScraperError> {
    let oldest = page
        .attributes(GRID_TIMES, "datetime")
        .await?
        .into_iter()
        .filter_map(parse_timestamp)
        .min();
    Ok(oldest.map(month_year))
}

//! Per-post extraction from the profile grid.
//!
//! Each post is opened (overlay, or direct navigation when no overlay shows
//! up), read, and closed again. A post that fails is skipped.

use chrono::Utc;
use instifier_core::{PostRecord, ProfileRecord};

use super::selectors::{
    link_with_href, scoped, ARTICLE, DIALOG, POST_CAPTION, POST_COMMENTS, POST_IMAGE, POST_LIKES,
    POST_LINKS, POST_STAT_SPANS, POST_TIME, POST_VIDEO, POST_VIDEO_SOURCE,
};
use super::{return_to_profile, DomExtractor};
use crate::error::ScraperError;
use crate::normalize::{parse_abbreviated_count, parse_timestamp};
use crate::page::PageQuery;

pub(super) async fn extract_posts(
    page: &dyn PageQuery,
    record: &ProfileRecord,
    extractor: &DomExtractor,
) -> Vec<PostRecord> {
    let username = record.username.as_str();
    let hrefs = match page.attributes(POST_LINKS, "href").await {
        Ok(hrefs) => hrefs,
        Err(e) => {
            tracing::warn!(username, error = %e, "could not list post links");
            return Vec::new();
        }
    };

    let candidates = candidate_links(&hrefs, username, extractor.max_posts);
    if candidates.is_empty() {
        return Vec::new();
    }
    if let Err(e) = page.release_overlays().await {
        tracing::debug!(username, error = %e, "overlay release failed");
    }

    let mut posts = Vec::with_capacity(candidates.len());
    for href in &candidates {
        match extract_post(page, href, extractor).await {
            Ok(post) => posts.push(post),
            Err(e) => tracing::warn!(username, href = %href, error = %e, "skipping post"),
        }
        if let Err(e) = close_post(page, &record.profile_url, extractor).await {
            tracing::warn!(username, error = %e, "could not return to profile");
        }
    }
    posts
}

/// Post links in grid order, de-duplicated and capped: anything under `/p/`
/// or `/reel/`, plus sub-paths of the profile's own path (not the bare
/// profile link itself).
pub(super) fn candidate_links(hrefs: &[String], username: &str, max_posts: usize) -> Vec<String> {
    let own_prefix = format!("/{username}/");
    let mut seen: Vec<String> = Vec::new();
    for href in hrefs {
        if seen.len() >= max_posts {
            break;
        }
        let path = link_path(href);
        let own_sub_path = path.len() > own_prefix.len() && path.starts_with(&own_prefix);
        let is_post = path.contains("/p/") || path.contains("/reel/") || own_sub_path;
        if is_post && !seen.contains(href) {
            seen.push(href.clone());
        }
    }
    seen
}

/// Path part of an absolute or site-relative href.
fn link_path(href: &str) -> &str {
    match href.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => href,
    }
}

/// Shortcode segment following `/p/` or `/reel/`.
pub(super) fn shortcode(href: &str) -> Option<String> {
    let mut segments = href.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment == "p" || segment == "reel" {
            return segments.next().map(str::to_owned);
        }
    }
    None
}

fn absolute_url(site_base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_owned()
    } else {
        format!("{site_base}{href}")
    }
}

async fn extract_post(
    page: &dyn PageQuery,
    href: &str,
    extractor: &DomExtractor,
) -> Result<PostRecord, ScraperError> {
    let url = absolute_url(&extractor.site_base, href);

    let opened = page.click(&link_with_href(href), 0).await?
        && page.wait_for(DIALOG, extractor.post_timeout).await?;
    let scope = if opened {
        DIALOG
    } else {
        page.goto(&url, extractor.navigation_timeout).await?;
        if !page.wait_for(ARTICLE, extractor.post_timeout).await? {
            return Err(ScraperError::Timeout {
                step: format!("post view {href}"),
                millis: u64::try_from(extractor.post_timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        ARTICLE
    };

    let is_video = page.count(&scoped(scope, POST_VIDEO)).await? > 0;
    let media_url = media_url(page, scope, is_video).await?;
    let like_count = page
        .text(&scoped(scope, POST_LIKES))
        .await?
        .map_or(0, |t| parse_abbreviated_count(&t));
    let video_view_count = if is_video {
        page.texts(&scoped(scope, POST_STAT_SPANS))
            .await?
            .iter()
            .find(|t| t.to_lowercase().contains("view"))
            .map_or(0, |t| parse_abbreviated_count(t))
    } else {
        0
    };
    let comment_items = page.count(&scoped(scope, POST_COMMENTS)).await?;
    let timestamp = page
        .attribute(&scoped(scope, POST_TIME), "datetime")
        .await?
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);
    let caption = page
        .text(&scoped(scope, POST_CAPTION))
        .await?
        .unwrap_or_default();

    Ok(PostRecord {
        id: shortcode(href),
        url,
        media_url,
        is_video,
        like_count,
        // the first list item is the caption row
        comment_count: u64::try_from(comment_items.saturating_sub(1)).unwrap_or(0),
        video_view_count,
        caption,
        timestamp,
    })
}

async fn media_url(
    page: &dyn PageQuery,
    scope: &str,
    is_video: bool,
) -> Result<String, ScraperError> {
    if is_video {
        for selector in [POST_VIDEO, POST_VIDEO_SOURCE] {
            if let Some(src) = page.attribute(&scoped(scope, selector), "src").await? {
                return Ok(src);
            }
        }
    }
    Ok(page
        .attribute(&scoped(scope, POST_IMAGE), "src")
        .await?
        .unwrap_or_default())
}

async fn close_post(
    page: &dyn PageQuery,
    profile_url: &str,
    extractor: &DomExtractor,
) -> Result<(), ScraperError> {
    if page.count(DIALOG).await? > 0 {
        page.press_escape().await?;
    }
    return_to_profile(page, profile_url, extractor.navigation_timeout).await
}

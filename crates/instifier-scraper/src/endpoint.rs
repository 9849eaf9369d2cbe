//! HTTP client for the site's `web_profile_info` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instifier_core::{AccountType, PostRecord, ProfileRecord, SessionToken, Source};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::normalize::{join_address, location_from_bio, parse_timestamp, to_iso8601};
use crate::orchestrator::{FetchContext, ProfileSource};
use crate::rate_limit::RetryPolicy;
use crate::types::{MediaNode, ProfileInfoResponse, ProfileUser};

const PROFILE_INFO_PATH: &str = "/api/v1/users/web_profile_info/";

/// Client for the structured profile endpoint.
///
/// One GET per profile with browser-like headers. 429 and network failures
/// are retried with exponential backoff; every other failure is returned as a
/// typed error for the orchestrator to fall back on.
pub struct EndpointClient {
    client: Client,
    endpoint_base: String,
    site_base: String,
    max_posts: usize,
    retry: RetryPolicy,
}

impl EndpointClient {
    /// Creates a client with the configured timeout, headers, and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ScraperError::InvalidHeader`] if the
    /// configured app id is not a valid header value.
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        let app_id = HeaderValue::from_str(&config.app_id)
            .map_err(|e| ScraperError::InvalidHeader {
                name: "x-ig-app-id",
                reason: e.to_string(),
            })?;
        headers.insert(HeaderName::from_static("x-ig-app-id"), app_id);
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint_base: config.endpoint_base.trim_end_matches('/').to_owned(),
            site_base: config.site_base.trim_end_matches('/').to_owned(),
            max_posts: config.max_posts,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Fetches and maps one profile.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::NotFound`]: HTTP 404 or no user in the payload.
    /// - [`ScraperError::SessionExpired`]: a session cookie was sent and the
    ///   endpoint rejected it (401/403 or a login-required body).
    /// - [`ScraperError::Blocked`]: login-required body without a session.
    /// - [`ScraperError::RateLimited`]: HTTP 429 after all retries.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Http`]: network or TLS failure after all retries.
    /// - [`ScraperError::Deserialize`]: body is not the expected JSON.
    /// - [`ScraperError::InvalidUrl`]: the configured endpoint base is not a URL.
    pub async fn fetch_profile(
        &self,
        username: &str,
        session: Option<&SessionToken>,
    ) -> Result<ProfileRecord, ScraperError> {
        let url = self.profile_info_url(username)?;
        let domain = self.domain();

        let response = self.retry.run(|| {
            let url = url.clone();
            let domain = domain.clone();
            async move {
                let mut request = self.client.get(&url);
                if let Some(token) = session {
                    request = request.header(
                        reqwest::header::COOKIE,
                        format!("sessionid={}", token.as_str()),
                    );
                }

                let response = request.send().await?;
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok());
                    return Err(ScraperError::RateLimited {
                        domain,
                        retry_after_secs,
                    });
                }

                if status == StatusCode::NOT_FOUND {
                    return Err(ScraperError::NotFound {
                        username: username.to_owned(),
                    });
                }

                if session.is_some()
                    && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
                {
                    return Err(ScraperError::SessionExpired {
                        username: username.to_owned(),
                    });
                }

                if !status.is_success() {
                    return Err(ScraperError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<ProfileInfoResponse>(&body).map_err(|e| {
                    ScraperError::Deserialize {
                        context: format!("profile info for {username}"),
                        source: e,
                    }
                })
            }
        })
        .await?;

        if response.requires_login() {
            return Err(if session.is_some() {
                ScraperError::SessionExpired {
                    username: username.to_owned(),
                }
            } else {
                ScraperError::Blocked {
                    username: username.to_owned(),
                }
            });
        }

        let user = response.into_user().ok_or_else(|| ScraperError::NotFound {
            username: username.to_owned(),
        })?;

        let now = Utc::now();
        let mut record = map_user(username, &user, &self.site_base, self.max_posts, now);
        record.finalize(self.max_posts, now);
        tracing::info!(
            username = %record.username,
            followers = record.follower_count,
            posts = record.posts.len(),
            "profile fetched from structured endpoint"
        );
        Ok(record)
    }

    fn profile_info_url(&self, username: &str) -> Result<String, ScraperError> {
        let base = format!("{}{PROFILE_INFO_PATH}", self.endpoint_base);
        let mut url = reqwest::Url::parse(&base).map_err(|e| ScraperError::InvalidUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("username", username);
        Ok(url.to_string())
    }

    fn domain(&self) -> String {
        reqwest::Url::parse(&self.endpoint_base)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| self.endpoint_base.clone())
    }
}

#[async_trait]
impl ProfileSource for EndpointClient {
    fn source(&self) -> Source {
        Source::StructuredEndpoint
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<ProfileRecord, ScraperError> {
        self.fetch_profile(ctx.username, ctx.session).await
    }
}

/// Maps the endpoint's user object onto the canonical record.
///
/// Posts are capped at `max_posts`; a post without a timestamp takes `now`.
#[must_use]
pub fn map_user(
    username: &str,
    user: &ProfileUser,
    site_base: &str,
    max_posts: usize,
    now: DateTime<Utc>,
) -> ProfileRecord {
    let mut record = ProfileRecord::new(username, Source::StructuredEndpoint);
    record.profile_url = ProfileRecord::profile_url_for(site_base, &record.username);
    record.display_name = user.full_name.clone().unwrap_or_default();
    record.bio = user.biography.clone().unwrap_or_default();
    record.account_type = if user.is_business_account {
        AccountType::Business
    } else if user.is_professional_account {
        AccountType::Creator
    } else {
        AccountType::Personal
    };

    record.location = location_from_bio(&record.bio);
    if record.location.is_empty() {
        if let Some(address) = user.business_address() {
            record.location = join_address([
                address.street_address.as_deref(),
                address.city_name.as_deref(),
                address.region_name.as_deref(),
                address.country_name.as_deref(),
            ]);
        }
    }

    record.date_joined = user
        .join_timestamp()
        .map(to_iso8601)
        .filter(|iso| !iso.is_empty());

    record.follower_count = user.edge_followed_by.count;
    record.following_count = user.edge_follow.count;
    record.post_count = user.edge_owner_to_timeline_media.count;
    record.posts = user
        .edge_owner_to_timeline_media
        .edges
        .iter()
        .take(max_posts)
        .map(|edge| map_post(&edge.node, site_base, now))
        .collect();
    record
}

fn map_post(node: &MediaNode, site_base: &str, now: DateTime<Utc>) -> PostRecord {
    let url = node
        .shortcode
        .as_deref()
        .map(|code| format!("{}/p/{code}/", site_base.trim_end_matches('/')))
        .unwrap_or_default();
    PostRecord {
        id: node.id.clone().or_else(|| node.shortcode.clone()),
        url,
        media_url: node.display_url.clone().unwrap_or_default(),
        is_video: node.is_video,
        like_count: node.edge_liked_by.count,
        comment_count: node.edge_media_to_comment.count,
        video_view_count: node.video_view_count.unwrap_or(0),
        caption: node.caption().to_owned(),
        timestamp: node
            .taken_at_timestamp
            .and_then(parse_timestamp)
            .unwrap_or(now),
    }
}

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod tests;

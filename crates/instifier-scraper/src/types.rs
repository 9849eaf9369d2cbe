//! Response types for the `web_profile_info` endpoint.
//!
//! ## Observed shape
//!
//! ### Envelope
//! `{"data": {"user": {...}}, "status": "ok"}`. An unknown username answers
//! with `"user": null` (sometimes with a 200), so `user` is optional.
//!
//! ### Counts
//! Every count is wrapped in an object: `edge_followed_by: {"count": 123}`.
//! Missing wrappers default to zero. `edge_followed_by` may also carry an
//! `edges` list whose first node has a Unix `timestamp`, taken as the join date.
//!
//! ### `business_address_json`
//! A JSON document *encoded as a string*, or `null`. Decoded lazily by
//! [`ProfileUser::business_address`]; malformed strings are ignored.
//!
//! ### Login walls
//! With an expired `sessionid` cookie the endpoint answers
//! `{"message": "login_required", "require_login": true, "status": "fail"}`
//! or a checkpoint redirect; see [`ProfileInfoResponse::requires_login`].

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInfoResponse {
    #[serde(default)]
    pub data: Option<ProfileData>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub require_login: bool,
}

impl ProfileInfoResponse {
    /// `true` when the body signals that the session is no longer accepted.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        self.require_login
            || matches!(
                self.message.as_deref(),
                Some("login_required" | "checkpoint_required")
            )
    }

    #[must_use]
    pub fn into_user(self) -> Option<ProfileUser> {
        self.data.and_then(|d| d.user)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub user: Option<ProfileUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Count {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub is_business_account: bool,
    #[serde(default)]
    pub is_professional_account: bool,
    #[serde(default)]
    pub business_address_json: Option<String>,
    #[serde(default)]
    pub edge_followed_by: FollowedBy,
    #[serde(default)]
    pub edge_follow: Count,
    #[serde(default)]
    pub edge_owner_to_timeline_media: TimelineMedia,
}

impl ProfileUser {
    /// Unix timestamp on the first `edge_followed_by` node, if any.
    #[must_use]
    pub fn join_timestamp(&self) -> Option<i64> {
        self.edge_followed_by.edges.first()?.node.timestamp
    }

    /// Decodes `business_address_json`, if present and well-formed.
    #[must_use]
    pub fn business_address(&self) -> Option<BusinessAddress> {
        let raw = self.business_address_json.as_deref()?;
        serde_json::from_str(raw).ok()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowedBy {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub edges: Vec<FollowerEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowerEdge {
    #[serde(default)]
    pub node: FollowerNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowerNode {
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessAddress {
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineMedia {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub edges: Vec<MediaEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaEdge {
    pub node: MediaNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub shortcode: Option<String>,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub video_view_count: Option<u64>,
    #[serde(default)]
    pub edge_liked_by: Count,
    #[serde(default)]
    pub edge_media_to_comment: Count,
    #[serde(default)]
    pub taken_at_timestamp: Option<i64>,
    #[serde(default)]
    pub edge_media_to_caption: CaptionEdges,
}

impl MediaNode {
    #[must_use]
    pub fn caption(&self) -> &str {
        self.edge_media_to_caption
            .edges
            .first()
            .map_or("", |e| e.node.text.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionEdges {
    #[serde(default)]
    pub edges: Vec<CaptionEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionEdge {
    pub node: CaptionNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptionNode {
    #[serde(default)]
    pub text: String,
}

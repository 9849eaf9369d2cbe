use std::sync::{Arc, Mutex};

use chrono::TimeZone;
use instifier_core::AccountType;

use super::selectors::{
    link_with_href, scoped, ARTICLE, BIO_SPANS, DIALOG, DIALOG_BUTTONS, DIALOG_SPANS,
    DISPLAY_NAME, GRID_TIMES, HEADER, LOCATION, OPTIONS_BUTTON, POST_CAPTION, POST_COMMENTS,
    POST_IMAGE, POST_LIKES, POST_LINKS, POST_STAT_SPANS, POST_TIME, POST_VIDEO, SHOP_LINK,
    STAT_ITEMS,
};
use super::*;
use crate::testing::{lock, ClickEffect, FakeDom, FakeElement, FakePage};

const SITE: &str = "https://www.instagram.com";
const PROFILE: &str = "https://www.instagram.com/someone/";
const POST_A: &str = "https://www.instagram.com/p/AAA/";
const POST_B: &str = "https://www.instagram.com/p/BBB/";

fn el(text: &str) -> FakeElement {
    FakeElement::text(text)
}

fn extractor() -> DomExtractor {
    DomExtractor::new(SITE, 12, &BrowserSettings::default())
}

/// Profile page with a full header and no posts.
fn header_page() -> Arc<Mutex<FakeDom>> {
    let dom = FakeDom::shared();
    {
        let mut d = lock(&dom);
        d.url = PROFILE.to_owned();
        d.put(PROFILE, HEADER, vec![el("someone Professional dashboard")]);
        d.put(PROFILE, DISPLAY_NAME, vec![el(""), el("Some One")]);
        d.put(
            PROFILE,
            BIO_SPANS,
            vec![
                el("someone").in_container("someone"),
                el("Baker in town").in_container("Baker in town"),
                el("Baker in town").in_container("Baker in town"),
                el("120").in_container("120 posts"),
                el("📍 Lisbon, Portugal").in_container("📍 Lisbon, Portugal"),
            ],
        );
        d.put(
            PROFILE,
            STAT_ITEMS,
            vec![el("120 posts"), el("5.6K followers"), el("321 following")],
        );
        d.put(PROFILE, OPTIONS_BUTTON, vec![FakeElement::default()]);
        d.clicks.insert(
            OPTIONS_BUTTON.to_owned(),
            ClickEffect::Reveal(vec![(
                DIALOG_BUTTONS.to_owned(),
                vec![el("About this account"), el("Cancel")],
            )]),
        );
        d.clicks.insert(
            format!("{DIALOG_BUTTONS}|About this account"),
            ClickEffect::Reveal(vec![
                (DIALOG.to_owned(), vec![FakeElement::default()]),
                (
                    DIALOG_SPANS.to_owned(),
                    vec![
                        el("Date joined").in_container("Date joined March 2015"),
                        el("March 2015").in_container("Date joined March 2015"),
                        el("Portugal").in_container("Account based in Portugal"),
                    ],
                ),
            ]),
        );
    }
    dom
}

/// Adds one overlay post and one post that only opens by navigation.
fn add_posts(dom: &Arc<Mutex<FakeDom>>) {
    let mut d = lock(dom);
    d.put(
        PROFILE,
        POST_LINKS,
        vec![
            FakeElement::default().attr("href", "/p/AAA/"),
            FakeElement::default().attr("href", "/someone/"),
            FakeElement::default().attr("href", "/p/BBB/"),
        ],
    );

    let link_a = link_with_href("/p/AAA/");
    d.put(PROFILE, &link_a, vec![FakeElement::default()]);
    d.clicks
        .insert(link_a, ClickEffect::Navigate(POST_A.to_owned()));
    d.put(POST_A, DIALOG, vec![FakeElement::default()]);
    d.put(
        POST_A,
        &scoped(DIALOG, POST_IMAGE),
        vec![FakeElement::default().attr("src", "https://cdn.example/a.jpg")],
    );
    d.put(POST_A, &scoped(DIALOG, POST_LIKES), vec![el("1,024 likes")]);
    d.put(
        POST_A,
        &scoped(DIALOG, POST_COMMENTS),
        vec![el("caption row"), el("nice"), el("wow"), el("yum")],
    );
    d.put(
        POST_A,
        &scoped(DIALOG, POST_TIME),
        vec![FakeElement::default().attr("datetime", "2024-03-01T10:00:00.000Z")],
    );
    d.put(POST_A, &scoped(DIALOG, POST_CAPTION), vec![el("Fresh bread")]);

    d.put(POST_B, ARTICLE, vec![FakeElement::default()]);
    d.put(
        POST_B,
        &scoped(ARTICLE, POST_VIDEO),
        vec![FakeElement::default().attr("src", "https://cdn.example/b.mp4")],
    );
    d.put(POST_B, &scoped(ARTICLE, POST_LIKES), vec![el("80 likes")]);
    d.put(
        POST_B,
        &scoped(ARTICLE, POST_STAT_SPANS),
        vec![el("80 likes"), el("2.5K views")],
    );
    d.put(
        POST_B,
        &scoped(ARTICLE, POST_TIME),
        vec![FakeElement::default().attr("datetime", "2024-02-01T08:30:00Z")],
    );
}

#[tokio::test]
async fn header_fields_are_extracted() {
    let dom = header_page();
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "SomeOne").await.unwrap();

    assert_eq!(record.username, "someone");
    assert_eq!(record.profile_url, PROFILE);
    assert_eq!(record.display_name, "Some One");
    assert_eq!(record.bio, "Baker in town\n📍 Lisbon, Portugal");
    assert_eq!(record.post_count, 120);
    assert_eq!(record.follower_count, 5600);
    assert_eq!(record.following_count, 321);
    assert_eq!(record.account_type, AccountType::Creator);
    assert_eq!(record.location, "Lisbon, Portugal");
    assert_eq!(record.date_joined.as_deref(), Some("March 2015"));
    assert_eq!(record.source, Source::Dom);
    assert!(record.posts.is_empty());
    assert!(record.engagement_rate.abs() < f64::EPSILON);

    let d = lock(&dom);
    assert_eq!(d.url, PROFILE);
    assert!(d.pages[PROFILE].get(DIALOG).is_none());
}

#[tokio::test]
async fn failing_location_leaves_other_fields_intact() {
    let dom = header_page();
    lock(&dom).failing.insert(LOCATION.to_owned());
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "someone").await.unwrap();

    assert_eq!(record.location, "");
    assert_eq!(record.display_name, "Some One");
    assert_eq!(record.bio, "Baker in town\n📍 Lisbon, Portugal");
    assert_eq!(record.post_count, 120);
    assert_eq!(record.follower_count, 5600);
    assert_eq!(record.following_count, 321);
    assert_eq!(record.account_type, AccountType::Creator);
    assert_eq!(record.date_joined.as_deref(), Some("March 2015"));
}

#[tokio::test]
async fn failing_bio_still_reads_counts_and_join_date() {
    let dom = header_page();
    lock(&dom).failing.insert(BIO_SPANS.to_owned());
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "someone").await.unwrap();

    assert_eq!(record.bio, "");
    assert_eq!(record.display_name, "Some One");
    assert_eq!(record.follower_count, 5600);
    assert_eq!(record.date_joined.as_deref(), Some("March 2015"));
}

#[tokio::test]
async fn missing_header_is_not_found() {
    let dom = FakeDom::shared();
    lock(&dom).url = PROFILE.to_owned();
    let page = FakePage::new(Arc::clone(&dom));

    let err = extractor().extract(&page, "someone").await.unwrap_err();

    assert!(matches!(err, ScraperError::NotFound { ref username } if username == "someone"));
}

#[tokio::test]
async fn business_shop_link_without_label() {
    let dom = header_page();
    {
        let mut d = lock(&dom);
        d.pages
            .get_mut(PROFILE)
            .unwrap()
            .insert(HEADER.to_owned(), vec![el("someone")]);
        d.put(PROFILE, SHOP_LINK, vec![FakeElement::default()]);
    }
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "someone").await.unwrap();

    assert_eq!(record.account_type, AccountType::Business);
}

#[tokio::test]
async fn join_date_falls_back_to_oldest_grid_post() {
    let dom = header_page();
    {
        let mut d = lock(&dom);
        d.pages.get_mut(PROFILE).unwrap().remove(OPTIONS_BUTTON);
        d.put(
            PROFILE,
            GRID_TIMES,
            vec![
                FakeElement::default().attr("datetime", "2023-05-02T00:00:00Z"),
                FakeElement::default().attr("datetime", "2019-07-15T12:00:00Z"),
            ],
        );
    }
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "someone").await.unwrap();

    assert_eq!(record.date_joined.as_deref(), Some("July 2019"));
}

#[tokio::test]
async fn posts_from_overlay_and_direct_navigation() {
    let dom = header_page();
    add_posts(&dom);
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "someone").await.unwrap();

    assert_eq!(record.posts.len(), 2);

    let first = &record.posts[0];
    assert_eq!(first.id.as_deref(), Some("AAA"));
    assert_eq!(first.url, POST_A);
    assert_eq!(first.media_url, "https://cdn.example/a.jpg");
    assert!(!first.is_video);
    assert_eq!(first.like_count, 1024);
    assert_eq!(first.comment_count, 3);
    assert_eq!(first.caption, "Fresh bread");
    assert_eq!(
        first.timestamp,
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    );

    let second = &record.posts[1];
    assert_eq!(second.id.as_deref(), Some("BBB"));
    assert!(second.is_video);
    assert_eq!(second.media_url, "https://cdn.example/b.mp4");
    assert_eq!(second.video_view_count, 2500);
    assert_eq!(second.comment_count, 0);

    // (1024 + 3 + 80 + 2500) / 5600 = 64.41%
    assert!((record.engagement_rate - 64.41).abs() < 1e-9);
    assert_eq!(lock(&dom).url, PROFILE);
}

#[tokio::test]
async fn profile_sub_path_links_are_opened_as_posts() {
    const GUIDE: &str = "https://www.instagram.com/someone/guide/G1/";
    let dom = header_page();
    {
        let mut d = lock(&dom);
        d.put(
            PROFILE,
            POST_LINKS,
            vec![
                FakeElement::default().attr("href", "/someone/"),
                FakeElement::default().attr("href", "/someone/guide/G1/"),
            ],
        );
        let link = link_with_href("/someone/guide/G1/");
        d.put(PROFILE, &link, vec![FakeElement::default()]);
        d.clicks.insert(link, ClickEffect::Navigate(GUIDE.to_owned()));
        d.put(GUIDE, DIALOG, vec![FakeElement::default()]);
        d.put(GUIDE, &scoped(DIALOG, POST_LIKES), vec![el("12 likes")]);
    }
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "someone").await.unwrap();

    assert_eq!(record.posts.len(), 1);
    assert_eq!(record.posts[0].url, GUIDE);
    assert_eq!(record.posts[0].like_count, 12);
    assert!(record.posts[0].id.is_none());
    assert_eq!(lock(&dom).url, PROFILE);
}

#[tokio::test]
async fn unreadable_post_is_skipped() {
    let dom = header_page();
    add_posts(&dom);
    lock(&dom).pages.remove(POST_B);
    let page = FakePage::new(Arc::clone(&dom));

    let record = extractor().extract(&page, "someone").await.unwrap();

    assert_eq!(record.posts.len(), 1);
    assert_eq!(record.posts[0].id.as_deref(), Some("AAA"));
    assert_eq!(lock(&dom).url, PROFILE);
}

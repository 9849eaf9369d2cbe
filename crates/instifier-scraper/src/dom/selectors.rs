//! CSS selectors for the profile and post views.

pub(crate) const HEADER: &str = "header";
pub(crate) const DISPLAY_NAME: &str = "header h1, header h2";
pub(crate) const BIO_SPANS: &str = "header section div span";
pub(crate) const STAT_ITEMS: &str = "header ul li";
pub(crate) const SHOP_LINK: &str = "a[href*='/shop/']";
pub(crate) const LOCATION: &str =
    "header a[href*='location'], header div:has(svg[aria-label='Location'])";

pub(crate) const OPTIONS_BUTTON: &str = "svg[aria-label='Options']";
pub(crate) const DIALOG: &str = "div[role='dialog']";
pub(crate) const DIALOG_BUTTONS: &str = "div[role='dialog'] button";
pub(crate) const DIALOG_SPANS: &str = "div[role='dialog'] span";
pub(crate) const GRID_TIMES: &str = "article a time";

pub(crate) const POST_LINKS: &str = "article a[role='link']";
pub(crate) const ARTICLE: &str = "article";
pub(crate) const POST_VIDEO: &str = "video";
pub(crate) const POST_VIDEO_SOURCE: &str = "video source";
pub(crate) const POST_IMAGE: &str = "div img";
pub(crate) const POST_LIKES: &str = "section div span";
pub(crate) const POST_STAT_SPANS: &str = "section span";
pub(crate) const POST_COMMENTS: &str = "ul li";
pub(crate) const POST_TIME: &str = "time";
pub(crate) const POST_CAPTION: &str = "h1, div span";

/// Prefixes every selector in a comma-separated list with `scope`.
pub(crate) fn scoped(scope: &str, selectors: &str) -> String {
    selectors
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{scope} {s}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Attribute selector matching one exact `href`.
pub(crate) fn link_with_href(href: &str) -> String {
    let escaped = href.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{POST_LINKS}[href=\"{escaped}\"]")
}

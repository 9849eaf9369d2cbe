//! Best-effort page snapshots written when navigation fails for good.

use std::path::{Path, PathBuf};

use crate::page::BrowserPage;

/// Writes `<debug_dir>/<username>/<label>.png` and `.html`.
///
/// Failures are logged and swallowed. Returns the directory when at least
/// one artifact was written.
pub(crate) async fn capture_snapshot(
    page: &dyn BrowserPage,
    debug_dir: &Path,
    username: &str,
    label: &str,
) -> Option<PathBuf> {
    let dir = debug_dir.join(username);
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        tracing::warn!(dir = %dir.display(), error = %e, "could not create debug directory");
        return None;
    }

    let mut written = false;

    let png = dir.join(format!("{label}.png"));
    match page.screenshot(&png).await {
        Ok(()) => written = true,
        Err(e) => tracing::warn!(username, error = %e, "screenshot capture failed"),
    }

    let html_path = dir.join(format!("{label}.html"));
    match page.content().await {
        Ok(html) => match tokio::fs::write(&html_path, html).await {
            Ok(()) => written = true,
            Err(e) => tracing::warn!(path = %html_path.display(), error = %e, "could not write page html"),
        },
        Err(e) => tracing::warn!(username, error = %e, "page html capture failed"),
    }

    if written {
        tracing::info!(username, dir = %dir.display(), "diagnostic snapshot saved");
        Some(dir)
    } else {
        None
    }
}

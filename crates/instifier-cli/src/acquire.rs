//! Acquisition command handlers.
//!
//! Called from `main` once the pool and config exist. A single failing
//! profile in a batch is recorded on the run ledger, never propagated.

use std::path::Path;

use anyhow::Context;
use instifier_core::{AppConfig, Credentials};
use instifier_scraper::{
    batch_usernames, AcquireOutcome, AcquireRequest, AcquireSettings, Acquirer, BrowserController,
    BrowserStrategy, ChromiumLauncher, DomExtractor, EndpointClient, ScraperConfig,
};
use sqlx::PgPool;

use crate::fail_run_best_effort;
use crate::ingest::read_usernames;
use crate::store::PgStore;

type PgAcquirer = Acquirer<EndpointClient, BrowserStrategy<ChromiumLauncher>, PgStore, PgStore>;

/// Credentials from config when `login` is requested.
///
/// # Errors
///
/// Returns an error if `login` is set but either login variable is missing.
pub(crate) fn login_credentials(
    config: &AppConfig,
    login: bool,
) -> anyhow::Result<Option<Credentials>> {
    if !login {
        return Ok(None);
    }
    match (&config.login_username, &config.login_password) {
        (Some(user), Some(password)) => Ok(Some(Credentials::new(user, password))),
        _ => anyhow::bail!(
            "--login needs INSTIFIER_LOGIN_USERNAME and INSTIFIER_LOGIN_PASSWORD to be set"
        ),
    }
}

pub(crate) fn browser_controller(scraper: &ScraperConfig) -> BrowserController<ChromiumLauncher> {
    BrowserController::new(
        ChromiumLauncher::new(scraper.browser.clone()),
        scraper.browser.clone(),
        &scraper.site_base,
    )
}

fn build_acquirer(pool: &PgPool, config: &AppConfig) -> anyhow::Result<PgAcquirer> {
    let scraper = ScraperConfig::from_app_config(config);
    let endpoint = EndpointClient::new(&scraper)
        .map_err(|e| anyhow::anyhow!("failed to build endpoint client: {e}"))?;
    let extractor = DomExtractor::new(&scraper.site_base, scraper.max_posts, &scraper.browser);
    let dom = BrowserStrategy::new(browser_controller(&scraper), extractor);
    let store = PgStore::new(pool.clone());

    Ok(Acquirer::new(
        endpoint,
        dom,
        store.clone(),
        store,
        AcquireSettings::from_scraper_config(&scraper),
    ))
}

/// Acquires one profile and prints the outcome.
///
/// # Errors
///
/// Returns an error for an invalid username, missing login settings, or a
/// store failure. A profile that cannot be found is reported, not an error.
pub(crate) async fn run_acquire(
    pool: &PgPool,
    config: &AppConfig,
    username: &str,
    force: bool,
    login: bool,
) -> anyhow::Result<()> {
    let acquirer = build_acquirer(pool, config)?;
    let request = AcquireRequest {
        username: username.to_string(),
        credentials: login_credentials(config, login)?,
        force,
    };

    match acquirer.acquire(request).await? {
        AcquireOutcome::Cached { scraped_at } => {
            println!("{username}: fresh (scraped {scraped_at}), skipped; pass --force to refetch");
        }
        AcquireOutcome::Scraped(record) => {
            println!(
                "{}: {} followers, {} posts kept, engagement {:.2}% via {}",
                record.username,
                record.follower_count,
                record.posts.len(),
                record.engagement_rate,
                record.source
            );
        }
        AcquireOutcome::NotFound => println!("{username}: not found"),
    }
    Ok(())
}

/// Acquires every username from `usernames` and `file`, recording the run.
///
/// # Errors
///
/// Returns an error if no usernames were given, the file cannot be read, or
/// the run ledger cannot be written.
pub(crate) async fn run_batch(
    pool: &PgPool,
    config: &AppConfig,
    mut usernames: Vec<String>,
    file: Option<&Path>,
    force: bool,
    login: bool,
) -> anyhow::Result<()> {
    if let Some(path) = file {
        let reader = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        usernames.extend(read_usernames(reader)?);
    }
    let usernames = batch_usernames(&usernames);
    if usernames.is_empty() {
        anyhow::bail!("no usernames given; pass them as arguments or with --file");
    }
    let credentials = login_credentials(config, login)?;

    let requested = i32::try_from(usernames.len()).unwrap_or(i32::MAX);
    let run = instifier_db::create_acquisition_run(pool, "cli", requested, force).await?;

    let acquirer = match build_acquirer(pool, config) {
        Ok(acquirer) => acquirer,
        Err(e) => {
            fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
            return Err(e);
        }
    };

    let report = acquirer
        .acquire_batch(&usernames, credentials.as_ref(), force)
        .await;

    let succeeded = i32::try_from(report.succeeded.len()).unwrap_or(i32::MAX);
    let elapsed_ms = i64::try_from(report.elapsed.as_millis()).unwrap_or(i64::MAX);
    instifier_db::complete_acquisition_run(pool, run.id, succeeded, &report.failed, elapsed_ms)
        .await?;

    println!(
        "run {}: {} succeeded, {} failed in {:.1}s",
        run.public_id,
        report.succeeded.len(),
        report.failed.len(),
        report.elapsed.as_secs_f64()
    );
    if !report.failed.is_empty() {
        println!("failed: {}", report.failed.join(", "));
    }
    Ok(())
}

/// Prints the stored record and any supplementary fields as JSON.
///
/// # Errors
///
/// Returns an error if nothing is stored for `username` or a query fails.
pub(crate) async fn run_show(pool: &PgPool, username: &str) -> anyhow::Result<()> {
    let username = instifier_scraper::validate_username(username)?;
    let row = instifier_db::get_profile(pool, &username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no stored profile for '{username}'"))?;
    let record = row.into_record()?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if let Some(supplement) = instifier_db::get_supplement(pool, &username).await? {
        println!(
            "supplementary fields: {}",
            serde_json::to_string_pretty(&supplement.fields.0)?
        );
    }
    Ok(())
}

/// Lists the most recent batch runs.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_list_runs(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = instifier_db::list_acquisition_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no acquisition runs recorded");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {}  {:<9}  requested={} succeeded={} failed={}{}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.public_id,
            run.status,
            run.requested,
            run.succeeded,
            run.failed,
            run.error_message
                .map(|m| format!("  error={m}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

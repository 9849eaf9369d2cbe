//! CSV adapters: username lists for batches and supplementary profile fields.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use instifier_scraper::{parse_abbreviated_count, validate_username};
use serde_json::{Map, Value};
use sqlx::PgPool;

const USERNAME_HEADER: &str = "username";

/// One CSV row of supplementary fields for a profile.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SupplementRow {
    pub username: String,
    pub fields: Map<String, Value>,
}

fn is_count_column(name: &str) -> bool {
    name.ends_with("_count") || matches!(name, "followers" | "following" | "posts")
}

/// Plain numbers become JSON numbers; anything else stays text.
fn cell_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| Value::from(raw), Value::Number)
}

/// Reads usernames from the first column, skipping blanks and a `username`
/// header row.
///
/// # Errors
///
/// Returns an error if the input is not valid CSV.
pub(crate) fn read_usernames<R: Read>(reader: R) -> anyhow::Result<Vec<String>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut usernames = Vec::new();
    for (i, record) in csv.records().enumerate() {
        let record = record.context("failed to read username list")?;
        let Some(first) = record.get(0) else {
            continue;
        };
        if first.is_empty() || (i == 0 && first.eq_ignore_ascii_case(USERNAME_HEADER)) {
            continue;
        }
        usernames.push(first.to_string());
    }
    Ok(usernames)
}

/// Reads supplementary fields keyed by a required `username` column.
///
/// Count-like columns are parsed as abbreviated counts. Other numeric cells
/// are stored as numbers and the rest as text. Blank cells are omitted so they never overwrite earlier data.
///
/// # Errors
///
/// Returns an error if the `username` column is missing or the CSV is malformed.
pub(crate) fn read_supplements<R: Read>(reader: R) -> anyhow::Result<Vec<SupplementRow>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    let username_idx = headers
        .iter()
        .position(|h| h == USERNAME_HEADER)
        .ok_or_else(|| anyhow::anyhow!("CSV has no '{USERNAME_HEADER}' column"))?;

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record.context("failed to read CSV row")?;
        let username = record.get(username_idx).unwrap_or_default().to_string();
        if username.is_empty() {
            continue;
        }

        let mut fields = Map::new();
        for (idx, value) in record.iter().enumerate() {
            if idx == username_idx || value.is_empty() {
                continue;
            }
            let Some(name) = headers.get(idx) else {
                continue;
            };
            let value = if is_count_column(name) {
                Value::from(parse_abbreviated_count(value))
            } else {
                cell_value(value)
            };
            fields.insert(name.clone(), value);
        }
        rows.push(SupplementRow { username, fields });
    }
    Ok(rows)
}

/// Merges every row of `path` into the supplements table.
///
/// Rows with an invalid username or no fields are skipped with a warning.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a write fails.
pub(crate) async fn run_ingest(pool: &PgPool, path: &Path) -> anyhow::Result<()> {
    let file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let rows = read_supplements(file)?;

    let mut merged = 0usize;
    let mut skipped = 0usize;
    for row in rows {
        let username = match validate_username(&row.username) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(username = %row.username, error = %e, "skipping row");
                skipped += 1;
                continue;
            }
        };
        if row.fields.is_empty() {
            skipped += 1;
            continue;
        }
        instifier_db::merge_supplement(pool, &username, &row.fields).await?;
        merged += 1;
    }

    tracing::info!(merged, skipped, path = %path.display(), "ingest complete");
    println!("ingested {merged} profiles ({skipped} skipped)");
    Ok(())
}

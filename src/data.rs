//! Tick data loading
//!
//! Reads historical bid/ask ticks from CSV for backtest replay. Columns are
//! located by header name (`bid`, `ask` and an optional `time`/`date`/
//! `datetime`/`timestamp`), so extra columns and ordering do not matter.
//! Rows that fail validation are skipped with a warning.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::Tick;

const TIME_COLUMNS: &[&str] = &["time", "date", "datetime", "timestamp"];

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Load ticks from a CSV file with validation
pub fn load_ticks(path: impl AsRef<Path>) -> Result<Vec<Tick>> {
    let path = path.as_ref();
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open tick file {}", path.display()))?;

    let ticks = read_ticks(reader, &path.display().to_string())?;
    info!("Loaded {} ticks from {}", ticks.len(), path.display());
    Ok(ticks)
}

/// Parse ticks from any CSV source
pub fn read_ticks<R: std::io::Read>(mut reader: csv::Reader<R>, source: &str) -> Result<Vec<Tick>> {
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let column = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };

    let bid_idx = column(&["bid"]).context("Missing bid column")?;
    let ask_idx = column(&["ask"]).context("Missing ask column")?;
    let time_idx = column(TIME_COLUMNS);

    let mut ticks = Vec::new();
    let mut invalid_count = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let bid: f64 = record
            .get(bid_idx)
            .context("Missing bid value")?
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse bid at row {}", row_idx + 1))?;
        let ask: f64 = record
            .get(ask_idx)
            .context("Missing ask value")?
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse ask at row {}", row_idx + 1))?;

        let time = match time_idx.and_then(|i| record.get(i)).map(str::trim) {
            Some(s) if !s.is_empty() => Some(parse_time(s)?),
            _ => None,
        };

        match Tick::new(bid, ask, time) {
            Ok(tick) => ticks.push(tick),
            Err(e) => {
                invalid_count += 1;
                warn!(
                    "Skipping invalid tick at row {} in {}: {}",
                    row_idx + 2, // +2 for 1-indexed and header row
                    source,
                    e
                );
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            "Skipped {} invalid ticks out of {} in {}",
            invalid_count,
            invalid_count + ticks.len(),
            source
        );
    }

    Ok(ticks)
}

/// Parse a tick timestamp (RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` or `YYYY-MM-DD`)
pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    if let Some(ndt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|nd| nd.and_hms_opt(0, 0, 0))
    {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    anyhow::bail!(
        "Failed to parse time: {}. Use RFC 3339, YYYY-MM-DD HH:MM:SS or YYYY-MM-DD",
        s
    )
}

/// Filter ticks by time range. Ticks without a timestamp are kept.
pub fn filter_ticks_by_time(
    ticks: Vec<Tick>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<Tick> {
    ticks
        .into_iter()
        .filter(|t| match t.time {
            Some(time) => {
                start.is_none_or(|s| time >= s) && end.is_none_or(|e| time <= e)
            }
            None => true,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

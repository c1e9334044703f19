//! Parse an exported SMS inbox (CSV) into raw messages.
//!
//! Expected header: sender,body,received_at
//! `received_at` is RFC 3339 or epoch milliseconds (what Android reports).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::warn;

use crate::types::RawMessage;

/// Parse an inbox CSV file, skipping rows with an empty body or unreadable timestamp.
pub fn parse_inbox_csv(path: impl AsRef<Path>) -> Result<Vec<RawMessage>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;

    let mut messages = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", line + 2))?;

        let body = record.get(1).unwrap_or("").trim();
        if body.is_empty() {
            continue;
        }

        let ts = record.get(2).unwrap_or("").trim();
        let received_at = match parse_timestamp(ts) {
            Some(t) => t,
            None => {
                warn!(row = line + 2, timestamp = ts, "skipping row with unreadable timestamp");
                continue;
            }
        };

        messages.push(RawMessage::new(
            record.get(0).unwrap_or("").trim(),
            body,
            received_at,
        ));
    }

    Ok(messages)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    let millis: i64 = s.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

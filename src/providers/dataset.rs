//! Loads the historical BTC/USD dataset into a [`PriceTable`].

use crate::core::price::PriceTable;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub fn load_price_table(path: &Path) -> Result<PriceTable> {
    let file =
        File::open(path).with_context(|| format!("Failed to open dataset: {}", path.display()))?;
    let table = read_price_table(file)
        .with_context(|| format!("Failed to load dataset: {}", path.display()))?;
    info!(
        entries = table.len(),
        first = ?table.first_date(),
        last = ?table.last_date(),
        "Loaded price dataset"
    );
    Ok(table)
}

/// Reads a CSV with a header row containing `Date` and `Close`.
///
/// Rows whose date is not `YYYY-MM-DD` are skipped. A close that does not
/// parse is kept as NaN so the date reads as missing instead of wrong.
pub fn read_price_table<R: Read>(reader: R) -> Result<PriceTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("Missing '{}' column", name))
    };
    let date_idx = column("Date")?;
    let close_idx = column("Close")?;

    let mut entries = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Failed to parse CSV line {}", line_num + 2))?;

        let raw_date = record.get(date_idx).unwrap_or("");
        let Ok(date) = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") else {
            debug!(line = line_num + 2, raw_date, "Skipping row with invalid date");
            continue;
        };
        let close = record
            .get(close_idx)
            .and_then(|c| c.parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        entries.push((date, close));
    }

    Ok(entries.into_iter().collect())
}

//! OHLCV input discovery and CSV parsing.
//!
//! Inputs are either a single CSV file or a directory that is walked for
//! files with a configured extension. Each file holds one symbol's history.

use crate::config::LoaderConfig;
use crate::error::AnalysisError;
use crate::models::{OhlcvBar, PriceSeries};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];
const DATE_ALIASES: [&str; 3] = ["date", "timestamp", "datetime"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Find input files under `path`.
///
/// A file path is returned as-is regardless of extension. Directories are
/// walked up to `max_depth`, skipping hidden entries; the result is sorted and
/// truncated to `max_files`.
pub fn discover(path: &Path, config: &LoaderConfig) -> Result<Vec<PathBuf>, AnalysisError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .max_depth(config.max_depth.max(1))
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() && has_extension(entry.path(), &config.extensions) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    if files.len() > config.max_files {
        warn!(
            "Found {} input files, analyzing the first {}",
            files.len(),
            config.max_files
        );
        files.truncate(config.max_files);
    }

    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Symbol for a file: the upper-cased stem (`reliance.csv` → `RELIANCE`).
pub fn symbol_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Read one OHLCV CSV file into a validated, date-sorted series.
pub fn load_csv(path: &Path, symbol: Option<&str>) -> Result<PriceSeries, AnalysisError> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut bars = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        // header is line 1
        let row = idx + 2;
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        bars.push(columns.parse_bar(&record, row)?);
    }

    if bars.is_empty() {
        return Err(AnalysisError::EmptySeries(path.display().to_string()));
    }

    let symbol = symbol
        .map(|s| s.trim().to_uppercase())
        .unwrap_or_else(|| symbol_from_path(path));
    let series = PriceSeries::new(symbol, bars);

    debug!(
        "Loaded {} bars for {} from {}",
        series.len(),
        series.symbol,
        path.display()
    );

    Ok(series)
}

/// Header positions of the columns we read.
struct ColumnMap {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, AnalysisError> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_lowercase(), i))
            .collect();

        let date = DATE_ALIASES
            .iter()
            .find_map(|alias| index.get(*alias).copied())
            .ok_or_else(|| AnalysisError::MissingColumn("date".to_string()))?;

        let find = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
        };

        let [open, high, low, close, volume] = REQUIRED_COLUMNS;
        Ok(Self {
            date,
            open: find(open)?,
            high: find(high)?,
            low: find(low)?,
            close: find(close)?,
            volume: find(volume)?,
        })
    }

    fn parse_bar(&self, record: &csv::StringRecord, row: usize) -> Result<OhlcvBar, AnalysisError> {
        let raw_date = record.get(self.date).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| AnalysisError::DateParse {
            row,
            value: raw_date.to_string(),
        })?;

        let field = |idx: usize, name: &str| -> Result<f64, AnalysisError> {
            let raw = record.get(idx).unwrap_or("");
            raw.replace(',', "")
                .parse::<f64>()
                .map_err(|_| AnalysisError::InvalidBar {
                    row,
                    reason: format!("{} '{}' is not a number", name, raw),
                })
        };

        let bar = OhlcvBar {
            date,
            open: field(self.open, "open")?,
            high: field(self.high, "high")?,
            low: field(self.low, "low")?,
            close: field(self.close, "close")?,
            volume: field(self.volume, "volume")?,
        };

        validate_bar(&bar).map_err(|reason| AnalysisError::InvalidBar { row, reason })?;
        Ok(bar)
    }
}

fn validate_bar(bar: &OhlcvBar) -> Result<(), String> {
    for (name, value) in [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(format!("{} must be a positive number, got {}", name, value));
        }
    }

    if bar.high < bar.low {
        return Err(format!("high {} is below low {}", bar.high, bar.low));
    }

    if !bar.volume.is_finite() || bar.volume < 0.0 {
        return Err(format!("volume must be non-negative, got {}", bar.volume));
    }

    Ok(())
}

/// Parse the date formats commonly found in broker exports.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

//! CSV file data adapter: one `<CODE>.csv` per instrument.

use crate::domain::error::WalkForwardError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions looked up from the header row.
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, WalkForwardError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| WalkForwardError::DataAccess {
                reason: format!("missing {} column", name),
            })
        };
        Ok(Self {
            date: require("date")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

/// Blank cells read as NaN so the bar is kept but never traded on.
fn parse_price(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<f64, WalkForwardError> {
    match record.get(idx).map(str::trim) {
        None | Some("") => Ok(f64::NAN),
        Some(s) => s.parse().map_err(|e| WalkForwardError::DataAccess {
            reason: format!("invalid {} value {:?}: {}", name, s, e),
        }),
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_series(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, WalkForwardError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| WalkForwardError::DataAccess {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| WalkForwardError::DataAccess {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let cols = Columns::from_headers(headers)?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| WalkForwardError::DataAccess {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = record
                .get(cols.date)
                .ok_or_else(|| WalkForwardError::DataAccess {
                    reason: "missing date value".into(),
                })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                WalkForwardError::DataAccess {
                    reason: format!("invalid date {:?}: {}", date_str, e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let volume = match cols.volume.and_then(|i| record.get(i)).map(str::trim) {
                None | Some("") => 0,
                Some(s) => s
                    .parse::<f64>()
                    .map(|v| v as i64)
                    .map_err(|e| WalkForwardError::DataAccess {
                        reason: format!("invalid volume value {:?}: {}", s, e),
                    })?,
            };

            bars.push(OhlcvBar {
                code: code.to_string(),
                date,
                open: parse_price(&record, cols.open, "open")?,
                high: parse_price(&record, cols.high, "high")?,
                low: parse_price(&record, cols.low, "low")?,
                close: parse_price(&record, cols.close, "close")?,
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

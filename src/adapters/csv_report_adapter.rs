//! CSV report adapter: `nav.csv`, `holdings.csv` and `allocation.csv` in one
//! output directory.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::allocation::TargetAllocation;
use crate::domain::error::WalkForwardError;
use crate::ports::report_port::ReportPort;

pub const NAV_FILE: &str = "nav.csv";
pub const HOLDINGS_FILE: &str = "holdings.csv";
pub const ALLOCATION_FILE: &str = "allocation.csv";

fn report_err(e: csv::Error) -> WalkForwardError {
    WalkForwardError::Report {
        reason: e.to_string(),
    }
}

pub struct CsvReportAdapter {
    output_dir: PathBuf,
    nav: csv::Writer<File>,
    holdings: csv::Writer<File>,
    allocation: csv::Writer<File>,
}

impl CsvReportAdapter {
    /// Creates `output_dir` if needed and truncates any earlier report files.
    pub fn create<P: AsRef<Path>>(output_dir: P) -> Result<Self, WalkForwardError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;

        let open = |name: &str, header: &[&str]| -> Result<csv::Writer<File>, WalkForwardError> {
            let mut writer = csv::Writer::from_path(output_dir.join(name)).map_err(report_err)?;
            writer.write_record(header).map_err(report_err)?;
            Ok(writer)
        };

        Ok(Self {
            nav: open(NAV_FILE, &["date", "nav", "benchmark_nav"])?,
            holdings: open(HOLDINGS_FILE, &["date", "code", "shares"])?,
            allocation: open(
                ALLOCATION_FILE,
                &["date", "risk_weight", "defensive_weight", "updated"],
            )?,
            output_dir,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_nav(
        &mut self,
        date: NaiveDate,
        nav: f64,
        benchmark_nav: f64,
    ) -> Result<(), WalkForwardError> {
        self.nav
            .write_record([
                date.to_string(),
                format!("{:.2}", nav),
                format!("{:.2}", benchmark_nav),
            ])
            .map_err(report_err)
    }

    fn write_holdings(
        &mut self,
        date: NaiveDate,
        holdings: &BTreeMap<String, i64>,
    ) -> Result<(), WalkForwardError> {
        for (code, shares) in holdings {
            self.holdings
                .write_record([date.to_string(), code.clone(), shares.to_string()])
                .map_err(report_err)?;
        }
        Ok(())
    }

    fn write_allocation(
        &mut self,
        date: NaiveDate,
        target: &TargetAllocation,
    ) -> Result<(), WalkForwardError> {
        self.allocation
            .write_record([
                date.to_string(),
                format!("{:.4}", target.risk_weight),
                format!("{:.4}", target.defensive_weight),
                target.updated.map(|d| d.to_string()).unwrap_or_default(),
            ])
            .map_err(report_err)
    }

    fn finish(&mut self) -> Result<(), WalkForwardError> {
        self.nav.flush()?;
        self.holdings.flush()?;
        self.allocation.flush()?;
        Ok(())
    }
}

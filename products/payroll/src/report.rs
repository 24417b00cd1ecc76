//! Plain-text payroll report.
//!
//! ```text
//! Employee report
//!
//! ID: 1, Name: Ada, Hours: 40, Pay: 400.00
//! ID: 2, Name: Grace, Hours: 10, Pay: 80.00
//!
//! Total payroll: 480.00
//! ```

use std::{fmt, fs, io, path::Path, str::FromStr};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerRow;

pub const REPORT_HEADER: &str = "Employee report";
const TOTAL_PREFIX: &str = "Total payroll: ";

#[derive(Debug, Error, PartialEq)]
pub enum ReportParseError {
    #[error("malformed report line: {0:?}")]
    MalformedLine(String),
    #[error("report has no total line")]
    MissingTotal,
}

/// One employee line: `ID: <id>, Name: <name>, Hours: <hours>, Pay: <pay>`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportLine {
    pub id: i32,
    pub name: String,
    pub hours_worked: i32,
    pub pay: f64,
}

impl From<&LedgerRow> for ReportLine {
    fn from(row: &LedgerRow) -> Self {
        Self {
            id: row.record.id,
            name: row.record.name.clone(),
            hours_worked: row.record.hours_worked,
            pay: row.net_pay,
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, Name: {}, Hours: {}, Pay: {:.2}",
            self.id, self.name, self.hours_worked, self.pay
        )
    }
}

impl FromStr for ReportLine {
    type Err = ReportParseError;

    // Names may contain ", " so the numeric fields are split off the right.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || ReportParseError::MalformedLine(line.to_string());
        let rest = line.strip_prefix("ID: ").ok_or_else(malformed)?;
        let (id, rest) = rest.split_once(", Name: ").ok_or_else(malformed)?;
        let (rest, pay) = rest.rsplit_once(", Pay: ").ok_or_else(malformed)?;
        let (name, hours) = rest.rsplit_once(", Hours: ").ok_or_else(malformed)?;
        Ok(Self {
            id: id.parse().map_err(|_| malformed())?,
            name: name.to_string(),
            hours_worked: hours.parse().map_err(|_| malformed())?,
            pay: pay.parse().map_err(|_| malformed())?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub lines: Vec<ReportLine>,
    pub total: f64,
}

impl Report {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a LedgerRow>) -> Self {
        let lines: Vec<ReportLine> = rows.into_iter().map(ReportLine::from).collect();
        let total = lines.iter().fold(0.0, |total, line| total + line.pay);
        Self { lines, total }
    }

    pub fn render(&self) -> String {
        let mut out = format!("{REPORT_HEADER}\n\n");
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out.push_str(&format!("\n{TOTAL_PREFIX}{:.2}\n", self.total));
        out
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())
    }

    /// Reads back a rendered report. Header and blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, ReportParseError> {
        let mut lines = Vec::new();
        let mut total = None;
        for raw in text.lines() {
            let raw = raw.trim_end();
            if raw.is_empty() || raw == REPORT_HEADER {
                continue;
            }
            if let Some(value) = raw.strip_prefix(TOTAL_PREFIX) {
                let parsed = value
                    .parse()
                    .map_err(|_| ReportParseError::MalformedLine(raw.to_string()))?;
                total = Some(parsed);
                continue;
            }
            lines.push(raw.parse()?);
        }
        let total = total.ok_or(ReportParseError::MissingTotal)?;
        Ok(Self { lines, total })
    }
}

/// Default file name offered when the user picks a destination.
pub fn suggested_file_name(now: DateTime<Local>) -> String {
    format!("report_{}.txt", now.format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line(id: i32, name: &str, hours: i32, pay: f64) -> ReportLine {
        ReportLine {
            id,
            name: name.into(),
            hours_worked: hours,
            pay,
        }
    }

    #[test]
    fn renders_header_lines_and_total() {
        let report = Report {
            lines: vec![line(1, "Ada", 40, 400.0), line(2, "Grace", 10, 80.0)],
            total: 480.0,
        };
        assert_eq!(
            report.render(),
            "Employee report\n\n\
             ID: 1, Name: Ada, Hours: 40, Pay: 400.00\n\
             ID: 2, Name: Grace, Hours: 10, Pay: 80.00\n\
             \nTotal payroll: 480.00\n"
        );
    }

    #[test]
    fn empty_report_still_has_total() {
        let report = Report {
            lines: vec![],
            total: 0.0,
        };
        let parsed = Report::parse(&report.render()).unwrap();
        assert!(parsed.lines.is_empty());
        assert_eq!(parsed.total, 0.0);
    }

    #[test]
    fn names_with_separators_survive_parsing() {
        let original = line(3, "Hopper, Grace, Hours: none", 7, 56.25);
        let parsed: ReportLine = original.to_string().parse().unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn garbage_lines_are_reported() {
        let err = "Name: Ada".parse::<ReportLine>().unwrap_err();
        assert_eq!(err, ReportParseError::MalformedLine("Name: Ada".into()));
        assert_eq!(
            Report::parse("Employee report\n\nID: 1, Name: A, Hours: 1, Pay: 1.00\n"),
            Err(ReportParseError::MissingTotal)
        );
    }

    #[test]
    fn suggested_name_is_timestamped() {
        let now = Local.with_ymd_and_hms(2026, 10, 19, 8, 5, 3).unwrap();
        assert_eq!(suggested_file_name(now), "report_2026-10-19_08-05-03.txt");
    }
}

use std::path::Path;

use async_graphql::SimpleObject;
use products_payroll::{EmployeeRecord, LedgerRow, Report};

#[derive(Clone, Debug, SimpleObject)]
pub struct EmployeeNode {
    pub id: i32,
    pub name: String,
    pub hours_worked: i32,
    pub hourly_rate: f64,
    pub net_pay: f64,
}

impl From<&LedgerRow> for EmployeeNode {
    fn from(row: &LedgerRow) -> Self {
        Self {
            id: row.record.id,
            name: row.record.name.clone(),
            hours_worked: row.record.hours_worked,
            hourly_rate: row.record.hourly_rate,
            net_pay: row.net_pay,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DeletedEmployee {
    /// Id the record had when it was deleted.
    pub id: i32,
    pub name: String,
}

impl From<EmployeeRecord> for DeletedEmployee {
    fn from(record: EmployeeRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ExportPayload {
    pub path: String,
    pub lines: i32,
    pub total: f64,
}

impl ExportPayload {
    pub fn new(path: &Path, report: &Report) -> Self {
        Self {
            path: path.display().to_string(),
            lines: i32::try_from(report.lines.len()).unwrap_or(i32::MAX),
            total: report.total,
        }
    }
}

//! Payroll ledger.
//!
//! [`EmployeeLedger`] keeps the displayed rows in memory and mirrors every
//! structural change into the `employees` table. Ids stay dense (`1..=n`)
//! and follow display order; net pay is derived on load from the configured
//! [`TaxPolicy`] and never stored.

mod error;
mod ledger;
mod record;
pub mod report;
mod tax;

pub use error::{LedgerError, LedgerResult, ValidationError};
pub use ledger::{EmployeeLedger, LedgerRow};
pub use record::{EmployeeRecord, NewEmployee};
pub use report::{Report, ReportLine};
pub use tax::{DEFAULT_TAX_RATE, TaxPolicy};

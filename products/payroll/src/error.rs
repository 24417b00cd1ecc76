use platform_db::DbError;
use thiserror::Error;

/// Rejected form input. Nothing is written to the store when one of these
/// is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name must not contain control characters")]
    ControlCharacterInName,
    #[error("hours worked is required")]
    MissingHours,
    #[error("hours worked must be a whole number of hours, got {0:?}")]
    InvalidHours(String),
    #[error("hours worked must not be negative")]
    NegativeHours,
    #[error("hourly rate is required")]
    MissingRate,
    #[error("hourly rate must be a number, got {0:?}")]
    InvalidRate(String),
    #[error("hourly rate must be a finite, non-negative number")]
    NegativeRate,
    #[error("hours worked times hourly rate is too large")]
    PayOverflow,
    #[error("tax rate must be between 0 and 1, got {0}")]
    InvalidTaxRate(f64),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("select a record to delete")]
    NoSelection,
    #[error("no employee with id {0}")]
    NotFound(i32),
    #[error(transparent)]
    Store(#[from] DbError),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

//! sea-orm entities for the payroll store.

pub mod employees;

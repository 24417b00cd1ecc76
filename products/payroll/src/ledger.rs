use std::path::Path;

use platform_db::{self, DbPool};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{
    error::{LedgerError, LedgerResult},
    record::{EmployeeRecord, NewEmployee},
    report::Report,
    tax::TaxPolicy,
};

/// A record as projected into the display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LedgerRow {
    pub record: EmployeeRecord,
    pub net_pay: f64,
    pub visible: bool,
}

/// In-memory display snapshot over the `employees` table.
///
/// Rows are held in id order and every structural change is followed by a
/// renumbering pass, so `rows()[i].record.id == i + 1` holds between calls.
pub struct EmployeeLedger {
    pool: DbPool,
    tax: TaxPolicy,
    rows: Vec<LedgerRow>,
    filter: Option<String>,
}

impl EmployeeLedger {
    /// Loads the store and compacts any id gaps left by earlier sessions.
    pub async fn open(pool: DbPool, tax: TaxPolicy) -> LedgerResult<Self> {
        let mut ledger = Self {
            pool,
            tax,
            rows: Vec::new(),
            filter: None,
        };
        ledger.load_all().await?;
        ledger.renumber_all().await?;
        info!(rows = ledger.rows.len(), tax_rate = tax.rate(), "ledger opened");
        Ok(ledger)
    }

    pub fn tax_policy(&self) -> TaxPolicy {
        self.tax
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &LedgerRow> {
        self.rows.iter().filter(|row| row.visible)
    }

    pub fn active_filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Validates the raw form fields, persists the record and reloads the
    /// display. Returns the new row as it is displayed after renumbering.
    #[instrument(skip(self, hours, rate))]
    pub async fn add_employee(
        &mut self,
        name: &str,
        hours: &str,
        rate: &str,
    ) -> LedgerResult<LedgerRow> {
        let input = NewEmployee::parse(name, hours, rate)?;
        let inserted_id = platform_db::insert_employee(
            &self.pool,
            &input.name,
            input.hours_worked,
            input.hourly_rate,
        )
        .await?;

        self.load_all().await?;
        let position = self
            .rows
            .iter()
            .position(|row| row.record.id == inserted_id)
            .ok_or(LedgerError::NotFound(inserted_id))?;
        self.renumber_all().await?;

        let row = self.rows[position].clone();
        info!(
            id = row.record.id,
            name = %row.record.name,
            net_pay = row.net_pay,
            "employee added"
        );
        Ok(row)
    }

    /// Deletes the selected record from the store and the display, then
    /// renumbers the remaining rows. Only visible rows can be selected.
    #[instrument(skip(self))]
    pub async fn delete_selected(&mut self, selected: Option<i32>) -> LedgerResult<EmployeeRecord> {
        let id = selected.ok_or(LedgerError::NoSelection)?;
        let position = self
            .rows
            .iter()
            .position(|row| row.visible && row.record.id == id)
            .ok_or(LedgerError::NotFound(id))?;

        if !platform_db::delete_employee(&self.pool, id).await? {
            debug!(id, "row already absent from store");
        }
        let removed = self.rows.remove(position);
        self.renumber_all().await?;
        info!(id, name = %removed.record.name, "employee deleted");
        Ok(removed.record)
    }

    /// Reassigns `id = position` top to bottom and persists every change.
    /// Returns how many rows moved.
    pub async fn renumber_all(&mut self) -> LedgerResult<usize> {
        let moves: Vec<(i32, i32)> = self
            .rows
            .iter()
            .zip(1..)
            .filter(|(row, new_id)| row.record.id != *new_id)
            .map(|(row, new_id)| (row.record.id, new_id))
            .collect();
        if moves.is_empty() {
            return Ok(0);
        }

        platform_db::renumber_employees(&self.pool, &moves).await?;
        for (row, new_id) in self.rows.iter_mut().zip(1..) {
            row.record.id = new_id;
        }
        debug!(moved = moves.len(), "ledger renumbered");
        Ok(moves.len())
    }

    /// Replaces the display with the store contents, deriving net pay under
    /// the current tax policy. An active filter is re-applied.
    pub async fn load_all(&mut self) -> LedgerResult<()> {
        let models = platform_db::list_employees(&self.pool).await?;
        let tax = self.tax;
        self.rows = models
            .into_iter()
            .map(EmployeeRecord::from)
            .map(|record| LedgerRow {
                net_pay: tax.net_pay(record.hours_worked, record.hourly_rate),
                record,
                visible: true,
            })
            .collect();
        if let Some(needle) = self.filter.clone() {
            self.apply_filter(&needle);
        }
        debug!(rows = self.rows.len(), "ledger reloaded from store");
        Ok(())
    }

    /// Hides rows whose name does not contain `substring`, ignoring case.
    /// A blank substring shows every row. Returns the visible count.
    pub fn filter(&mut self, substring: &str) -> usize {
        if substring.trim().is_empty() {
            self.reset_filter();
        } else {
            let needle = substring.to_lowercase();
            self.apply_filter(&needle);
            self.filter = Some(needle);
        }
        self.visible_rows().count()
    }

    pub fn reset_filter(&mut self) {
        self.filter = None;
        for row in &mut self.rows {
            row.visible = true;
        }
    }

    fn apply_filter(&mut self, needle: &str) {
        for row in &mut self.rows {
            row.visible = row.record.name.to_lowercase().contains(needle);
        }
    }

    /// Sum of net pay over the visible rows.
    pub fn total_payroll(&self) -> f64 {
        self.visible_rows()
            .fold(0.0, |total, row| total + row.net_pay)
    }

    pub fn report(&self) -> Report {
        Report::from_rows(self.visible_rows())
    }

    /// Writes the visible rows to `destination`. `None` means the user
    /// cancelled and nothing is written.
    pub fn export_report(&self, destination: Option<&Path>) -> LedgerResult<Option<Report>> {
        let Some(path) = destination else {
            debug!("report export cancelled");
            return Ok(None);
        };
        let report = self.report();
        report.write_to(path)?;
        info!(path = %path.display(), lines = report.lines.len(), "report exported");
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use platform_db::DatabaseSettings;

    async fn ledger_with(tax: TaxPolicy, staff: &[(&str, &str, &str)]) -> EmployeeLedger {
        let pool = platform_db::connect(&DatabaseSettings::new("sqlite::memory:"))
            .await
            .unwrap();
        Migrator::up(&pool, None).await.unwrap();
        let mut ledger = EmployeeLedger::open(pool, tax).await.unwrap();
        for (name, hours, rate) in staff {
            ledger.add_employee(name, hours, rate).await.unwrap();
        }
        ledger
    }

    fn names(ledger: &EmployeeLedger) -> Vec<&str> {
        ledger
            .visible_rows()
            .map(|row| row.record.name.as_str())
            .collect()
    }

    #[tokio::test]
    async fn filter_is_case_insensitive_substring() {
        let mut ledger = ledger_with(
            TaxPolicy::untaxed(),
            &[("Ada Lovelace", "1", "1"), ("Grace Hopper", "1", "1"), ("Alan", "1", "1")],
        )
        .await;

        assert_eq!(ledger.filter("LOVE"), 1);
        assert_eq!(names(&ledger), vec!["Ada Lovelace"]);
        // Hidden rows stay in the display.
        assert_eq!(ledger.rows().len(), 3);

        assert_eq!(ledger.filter("a"), 3);
        assert_eq!(ledger.filter("zzz"), 0);
        assert_eq!(ledger.total_payroll(), 0.0);
    }

    #[tokio::test]
    async fn blank_filter_and_reset_show_everything() {
        let mut ledger = ledger_with(
            TaxPolicy::untaxed(),
            &[("Ada", "1", "1"), ("Grace", "1", "1")],
        )
        .await;

        ledger.filter("ada");
        assert_eq!(ledger.filter(""), 2);
        assert_eq!(ledger.active_filter(), None);

        ledger.filter("ada");
        ledger.reset_filter();
        assert!(ledger.rows().iter().all(|row| row.visible));
    }

    #[tokio::test]
    async fn reload_keeps_active_filter() {
        let mut ledger = ledger_with(TaxPolicy::untaxed(), &[("Ada", "1", "1")]).await;
        ledger.filter("ada");

        let added = ledger.add_employee("Grace", "1", "1").await.unwrap();
        assert!(!added.visible);
        assert_eq!(names(&ledger), vec!["Ada"]);
        assert_eq!(ledger.active_filter(), Some("ada"));
    }

    #[tokio::test]
    async fn delete_without_selection_is_rejected() {
        let mut ledger = ledger_with(TaxPolicy::untaxed(), &[("Ada", "1", "1")]).await;
        let err = ledger.delete_selected(None).await.unwrap_err();
        assert!(matches!(err, LedgerError::NoSelection));
        assert_eq!(ledger.rows().len(), 1);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_rejected() {
        let mut ledger = ledger_with(TaxPolicy::untaxed(), &[("Ada", "1", "1")]).await;
        let err = ledger.delete_selected(Some(7)).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(7)));
    }

    #[tokio::test]
    async fn hidden_rows_cannot_be_deleted() {
        let mut ledger = ledger_with(
            TaxPolicy::untaxed(),
            &[("Ada", "1", "1"), ("Grace", "1", "1")],
        )
        .await;
        ledger.filter("grace");
        let err = ledger.delete_selected(Some(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(1)));

        let removed = ledger.delete_selected(Some(2)).await.unwrap();
        assert_eq!(removed.name, "Grace");
        assert_eq!(ledger.rows().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_export_writes_nothing() {
        let ledger = ledger_with(TaxPolicy::untaxed(), &[("Ada", "1", "1")]).await;
        assert!(ledger.export_report(None).unwrap().is_none());
    }

    #[tokio::test]
    async fn report_covers_visible_rows_only() {
        let mut ledger = ledger_with(
            TaxPolicy::untaxed(),
            &[("Ada", "10", "10"), ("Grace", "20", "10")],
        )
        .await;
        ledger.filter("grace");
        let report = ledger.report();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].id, 2);
        assert_eq!(report.total, 200.0);
    }

    #[tokio::test]
    async fn empty_totals_render_as_positive_zero() {
        let mut ledger = ledger_with(TaxPolicy::default(), &[("Solo", "8", "15")]).await;
        ledger.filter("nobody");
        assert!(ledger.total_payroll().is_sign_positive());
        assert!(ledger.report().render().ends_with("Total payroll: 0.00\n"));

        ledger.reset_filter();
        ledger.delete_selected(Some(1)).await.unwrap();
        assert_eq!(format!("{:.2}", ledger.total_payroll()), "0.00");
        assert!(ledger.report().render().contains("Total payroll: 0.00"));
    }

    #[tokio::test]
    async fn filter_keeps_inner_whitespace_of_needle() {
        let mut ledger = ledger_with(
            TaxPolicy::untaxed(),
            &[("Ada Lovelace", "1", "1"), ("Alan", "1", "1")],
        )
        .await;
        assert_eq!(ledger.filter(" l"), 1);
        assert_eq!(names(&ledger), vec!["Ada Lovelace"]);
    }

    #[tokio::test]
    async fn name_with_line_break_is_not_stored() {
        let mut ledger = ledger_with(TaxPolicy::untaxed(), &[]).await;
        let err = ledger
            .add_employee("Ada\nLovelace", "1", "1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(crate::ValidationError::ControlCharacterInName)
        ));
        assert!(ledger.is_empty());
    }
}

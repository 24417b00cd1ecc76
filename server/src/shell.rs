//! Line-oriented front end over [`EmployeeLedger`].

use std::{path::PathBuf, str::FromStr};

use anyhow::Result;
use chrono::Local;
use platform_authn::CredentialGate;
use products_payroll::{EmployeeLedger, LedgerError, LedgerRow, report::suggested_file_name};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{info, warn};

const HELP: &str = "\
Commands:
  list              show the visible employees
  add               add an employee (prompts for name, hours and rate)
  select <id>       select a row for deletion
  delete [id]       delete the given or selected row
  filter <text>     show only names containing <text>
  reset             show every row again
  total             print the total payroll of the visible rows
  export [path]     write the visible rows to a report file
  help              show this help
  quit              leave the shell
";

#[derive(Debug, PartialEq)]
enum Command {
    List,
    Add,
    Select(i32),
    Delete(Option<i32>),
    Filter(String),
    Reset,
    Total,
    Export(Option<PathBuf>),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let parse_id = |raw: &str| {
            raw.parse::<i32>()
                .map_err(|_| format!("invalid id {raw:?}"))
        };
        match verb.to_lowercase().as_str() {
            "list" | "ls" => Ok(Self::List),
            "add" => Ok(Self::Add),
            "select" if rest.is_empty() => Err("usage: select <id>".into()),
            "select" => parse_id(rest).map(Self::Select),
            "delete" | "rm" if rest.is_empty() => Ok(Self::Delete(None)),
            "delete" | "rm" => parse_id(rest).map(|id| Self::Delete(Some(id))),
            "filter" => Ok(Self::Filter(rest.to_string())),
            "reset" => Ok(Self::Reset),
            "total" => Ok(Self::Total),
            "export" if rest.is_empty() => Ok(Self::Export(None)),
            "export" => Ok(Self::Export(Some(PathBuf::from(rest)))),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command {other:?}; type `help`")),
        }
    }
}

pub struct Shell<'a, R, W> {
    ledger: &'a mut EmployeeLedger,
    lines: Lines<R>,
    out: W,
    selected: Option<i32>,
}

impl<'a, R, W> Shell<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(ledger: &'a mut EmployeeLedger, input: R, out: W) -> Self {
        Self {
            ledger,
            lines: input.lines(),
            out,
            selected: None,
        }
    }

    /// Runs until `quit` or end of input. Returns early, without touching the
    /// ledger, when input ends before a successful login.
    pub async fn run(mut self, gate: Option<&CredentialGate>) -> Result<()> {
        if let Some(gate) = gate {
            if !self.login(gate).await? {
                return Ok(());
            }
        }

        self.write("Type `help` for commands.\n").await?;
        self.print_table().await?;
        while let Some(line) = self.prompt("payroll> ").await? {
            if line.trim().is_empty() {
                continue;
            }
            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(message) => {
                    self.write(&format!("{message}\n")).await?;
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            // Ledger failures are shown to the user; terminal failures end
            // the session.
            if let Err(err) = self.dispatch(command).await {
                self.report_error(err.downcast::<LedgerError>()?).await?;
            }
        }
        self.out.flush().await?;
        Ok(())
    }

    async fn login(&mut self, gate: &CredentialGate) -> Result<bool> {
        loop {
            let Some(username) = self.prompt("Username: ").await? else {
                return Ok(false);
            };
            let Some(password) = self.prompt("Password: ").await? else {
                return Ok(false);
            };
            match gate.verify(username.trim(), &password) {
                Ok(()) => {
                    info!(username = %username.trim(), "shell login");
                    self.write(&format!("Welcome, {}.\n", username.trim())).await?;
                    return Ok(true);
                }
                Err(err) => {
                    warn!(username = %username.trim(), "shell login rejected");
                    self.write(&format!("{err}\n")).await?;
                }
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::List => self.print_table().await?,
            Command::Add => self.add().await?,
            Command::Select(id) => {
                if self
                    .ledger
                    .visible_rows()
                    .any(|row| row.record.id == id)
                {
                    self.selected = Some(id);
                    self.print_table().await?;
                } else {
                    return Err(LedgerError::NotFound(id).into());
                }
            }
            Command::Delete(id) => {
                let removed = self.ledger.delete_selected(id.or(self.selected)).await?;
                self.selected = None;
                self.write(&format!("Deleted {}.\n", removed.name)).await?;
                self.print_table().await?;
            }
            Command::Filter(text) => {
                let visible = self.ledger.filter(&text);
                self.drop_hidden_selection();
                self.write(&format!("{visible} matching row(s).\n")).await?;
                self.print_table().await?;
            }
            Command::Reset => {
                self.ledger.reset_filter();
                self.print_table().await?;
            }
            Command::Total => {
                let total = self.ledger.total_payroll();
                self.write(&format!("Total payroll: {total:.2}\n")).await?;
            }
            Command::Export(path) => self.export(path).await?,
            Command::Help => self.write(HELP).await?,
            Command::Quit => {}
        }
        Ok(())
    }

    async fn add(&mut self) -> Result<()> {
        let Some(name) = self.prompt("Name: ").await? else {
            return Ok(());
        };
        let Some(hours) = self.prompt("Hours worked: ").await? else {
            return Ok(());
        };
        let Some(rate) = self.prompt("Hourly rate: ").await? else {
            return Ok(());
        };
        let row = self.ledger.add_employee(&name, &hours, &rate).await?;
        // Renumbering may have shifted the selected id.
        self.selected = None;
        self.write(&format!(
            "Added {} as #{} (net pay {:.2}).\n",
            row.record.name, row.record.id, row.net_pay
        ))
        .await?;
        self.print_table().await?;
        Ok(())
    }

    async fn export(&mut self, path: Option<PathBuf>) -> Result<()> {
        let destination = match path {
            Some(path) => Some(path),
            None => {
                let suggested = suggested_file_name(Local::now());
                match self
                    .prompt(&format!("Save report as [{suggested}] (or `cancel`): "))
                    .await?
                {
                    None => None,
                    Some(answer) if answer.trim().eq_ignore_ascii_case("cancel") => None,
                    Some(answer) if answer.trim().is_empty() => Some(PathBuf::from(suggested)),
                    Some(answer) => Some(PathBuf::from(answer.trim())),
                }
            }
        };

        match self.ledger.export_report(destination.as_deref())? {
            Some(report) => {
                let path = destination.unwrap_or_default();
                self.write(&format!(
                    "Wrote {} row(s) to {}.\n",
                    report.lines.len(),
                    path.display()
                ))
                .await?;
            }
            None => self.write("Export cancelled.\n").await?,
        }
        Ok(())
    }

    fn drop_hidden_selection(&mut self) {
        if let Some(id) = self.selected {
            if !self.ledger.visible_rows().any(|row| row.record.id == id) {
                self.selected = None;
            }
        }
    }

    async fn print_table(&mut self) -> std::io::Result<()> {
        let mut table = format!(
            "  {:>4}  {:<24} {:>6} {:>10} {:>10}\n",
            "ID", "Name", "Hours", "Rate", "Pay"
        );
        for row in self.ledger.visible_rows() {
            table.push_str(&render_row(row, self.selected == Some(row.record.id)));
        }
        if let Some(filter) = self.ledger.active_filter() {
            table.push_str(&format!("(filter: {filter:?})\n"));
        }
        self.write(&table).await
    }

    async fn report_error(&mut self, err: LedgerError) -> std::io::Result<()> {
        match &err {
            LedgerError::Store(_) | LedgerError::Io(_) => {
                tracing::error!(error = %err, "shell command failed");
            }
            _ => {}
        }
        self.write(&format!("Error: {err}\n")).await
    }

    async fn prompt(&mut self, label: &str) -> std::io::Result<Option<String>> {
        self.write(label).await?;
        self.out.flush().await?;
        self.lines.next_line().await
    }

    async fn write(&mut self, text: &str) -> std::io::Result<()> {
        self.out.write_all(text.as_bytes()).await
    }
}

fn render_row(row: &LedgerRow, selected: bool) -> String {
    format!(
        "{} {:>4}  {:<24} {:>6} {:>10.2} {:>10.2}\n",
        if selected { '>' } else { ' ' },
        row.record.id,
        row.record.name,
        row.record.hours_worked,
        row.record.hourly_rate,
        row.net_pay
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use platform_db::DatabaseSettings;
    use products_payroll::TaxPolicy;

    async fn ledger() -> EmployeeLedger {
        let pool = platform_db::connect(&DatabaseSettings::new("sqlite::memory:"))
            .await
            .unwrap();
        Migrator::up(&pool, None).await.unwrap();
        EmployeeLedger::open(pool, TaxPolicy::default()).await.unwrap()
    }

    async fn run_script(
        ledger: &mut EmployeeLedger,
        gate: Option<&CredentialGate>,
        script: &str,
    ) -> String {
        let mut out = Vec::new();
        Shell::new(ledger, script.as_bytes(), &mut out)
            .run(gate)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn commands_parse() {
        assert_eq!("select 3".parse::<Command>(), Ok(Command::Select(3)));
        assert_eq!("delete".parse::<Command>(), Ok(Command::Delete(None)));
        assert_eq!("rm 2".parse::<Command>(), Ok(Command::Delete(Some(2))));
        assert_eq!(
            "filter  ada lovelace ".parse::<Command>(),
            Ok(Command::Filter("ada lovelace".into()))
        );
        assert_eq!("EXPORT".parse::<Command>(), Ok(Command::Export(None)));
        assert!("select x".parse::<Command>().is_err());
        assert!("frobnicate".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn add_and_total_session() {
        let mut ledger = ledger().await;
        let output = run_script(
            &mut ledger,
            None,
            "add\nAda\n10\n10\nadd\nGrace\n20\n10\ntotal\nquit\n",
        )
        .await;

        assert!(output.contains("Added Ada as #1 (net pay 80.00)."));
        assert!(output.contains("Added Grace as #2 (net pay 160.00)."));
        assert!(output.contains("Total payroll: 240.00"));
        assert_eq!(ledger.rows().len(), 2);
    }

    #[tokio::test]
    async fn errors_are_reported_and_session_continues() {
        let mut ledger = ledger().await;
        let output = run_script(
            &mut ledger,
            None,
            "add\n\n1\n1\ndelete\nselect 9\nadd\nAda\n1\n1\ntotal\n",
        )
        .await;

        assert!(output.contains("Error: name must not be empty"));
        assert!(output.contains("Error: select a record to delete"));
        assert!(output.contains("Error: "));
        assert!(output.contains("Total payroll: 0.80"));
        assert_eq!(ledger.rows().len(), 1);
    }

    #[tokio::test]
    async fn select_then_delete_removes_selected_row() {
        let mut ledger = ledger().await;
        ledger.add_employee("Ada", "1", "1").await.unwrap();
        ledger.add_employee("Grace", "1", "1").await.unwrap();

        let output = run_script(&mut ledger, None, "select 1\ndelete\nlist\n").await;

        assert!(output.contains(">    1  Ada"));
        assert!(output.contains("Deleted Ada."));
        let names: Vec<_> = ledger.rows().iter().map(|r| r.record.name.as_str()).collect();
        assert_eq!(names, vec!["Grace"]);
        assert_eq!(ledger.rows()[0].record.id, 1);
    }

    #[tokio::test]
    async fn filter_hides_rows_from_listing() {
        let mut ledger = ledger().await;
        ledger.add_employee("Ada", "1", "1").await.unwrap();
        ledger.add_employee("Grace", "1", "1").await.unwrap();

        let output = run_script(&mut ledger, None, "filter gra\nreset\n").await;

        assert!(output.contains("1 matching row(s)."));
        assert!(output.contains("(filter: \"gra\")"));
        assert_eq!(ledger.active_filter(), None);
    }

    #[tokio::test]
    async fn login_retries_until_credentials_match() {
        let gate = CredentialGate::new("admin", "admin").unwrap();
        let mut ledger = ledger().await;
        let output = run_script(
            &mut ledger,
            Some(&gate),
            "admin\nwrong\nadmin\nadmin\ntotal\n",
        )
        .await;

        assert!(output.contains("Invalid username or password"));
        assert!(output.contains("Welcome, admin."));
        assert!(output.contains("Total payroll: 0.00"));
    }

    #[tokio::test]
    async fn end_of_input_during_login_never_opens_ledger() {
        let gate = CredentialGate::new("admin", "admin").unwrap();
        let mut ledger = ledger().await;
        let output = run_script(&mut ledger, Some(&gate), "admin\n").await;
        assert!(!output.contains("payroll>"));
    }

    #[tokio::test]
    async fn export_prompt_accepts_cancel() {
        let mut ledger = ledger().await;
        ledger.add_employee("Ada", "1", "1").await.unwrap();
        let output = run_script(&mut ledger, None, "export\ncancel\n").await;
        assert!(output.contains("Save report as [report_"));
        assert!(output.contains("Export cancelled."));
    }
}

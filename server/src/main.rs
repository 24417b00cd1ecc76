mod config;
mod graphql;
mod http;
mod shell;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use products_payroll::{EmployeeLedger, report::suggested_file_name};
use tokio::{io::BufReader, sync::Mutex};
use tracing::info;

use crate::{
    config::AppConfig,
    graphql::GraphqlData,
    http::{AppState, ServeConfig},
    shell::Shell,
};

#[derive(Parser, Debug)]
#[command(name = "payroll", version, about = "Employee payroll ledger")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive ledger shell (default).
    Shell,
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Write a report of every employee without opening the shell.
    Report {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
    /// Print the GraphQL schema snapshot.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "127.0.0.1")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Shell);
    let obs = match command {
        Command::Shell => ObsConfig::interactive(),
        _ => ObsConfig::default(),
    };
    init_tracing(obs)?;

    match command {
        Command::Shell => run_shell(Arc::new(AppConfig::load()?)).await,
        Command::Serve(cmd) => run_server(cmd, Arc::new(AppConfig::load()?)).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Report { output } => write_report(output, AppConfig::load()?).await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let sdl = graphql::schema_sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("failed to write {}", target.display()))?;
            info!(path = %target.display(), "schema snapshot written");
        }
        None => println!("{sdl}"),
    }
    Ok(())
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

/// Connects, creates the table if absent and loads the ledger. Any failure
/// here ends the process.
async fn open_ledger(config: &AppConfig) -> Result<(DbPool, EmployeeLedger)> {
    let pool = setup_pool().await.context("failed to open the employee store")?;
    Migrator::up(&pool, None)
        .await
        .context("failed to prepare the employee store")?;
    let ledger = EmployeeLedger::open(pool.clone(), config.tax)
        .await
        .context("failed to load the employee store")?;
    Ok((pool, ledger))
}

async fn run_shell(config: Arc<AppConfig>) -> Result<()> {
    let (_pool, mut ledger) = open_ledger(&config).await?;
    let input = BufReader::new(tokio::io::stdin());
    Shell::new(&mut ledger, input, tokio::io::stdout())
        .run(config.gate.as_ref())
        .await
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let (pool, ledger) = open_ledger(&config).await?;
    let schema = graphql::build_schema(GraphqlData {
        ledger: Arc::new(Mutex::new(ledger)),
        gate: config.gate.clone(),
        session: config.session.clone(),
    });
    let state = AppState {
        pool,
        schema,
        config,
    };
    http::serve(cmd.into(), state).await
}

async fn write_report(output: Option<PathBuf>, config: AppConfig) -> Result<()> {
    let (_pool, ledger) = open_ledger(&config).await?;
    let target = output.unwrap_or_else(|| PathBuf::from(suggested_file_name(Local::now())));
    let report = ledger
        .export_report(Some(&target))
        .with_context(|| format!("failed to write {}", target.display()))?;
    let rows = report.map(|report| report.lines.len()).unwrap_or_default();
    println!("Wrote {rows} row(s) to {}", target.display());
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

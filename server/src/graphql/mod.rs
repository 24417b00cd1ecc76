mod employees;
mod session;

use std::{path::PathBuf, sync::Arc};

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject};
use platform_api::{ApiError, internal_error};
use platform_authn::{CredentialGate, SessionConfig};
use products_payroll::{EmployeeLedger, LedgerError};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::instrument;

pub use employees::{DeletedEmployee, EmployeeNode, ExportPayload};
pub use session::{AuthPayload, RequestUser, SessionPayload};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// One display snapshot shared by every HTTP caller; the mutex serialises
/// ledger operations.
pub type SharedLedger = Arc<Mutex<EmployeeLedger>>;

#[derive(Clone)]
pub struct GraphqlData {
    pub ledger: SharedLedger,
    pub gate: Option<CredentialGate>,
    pub session: SessionConfig,
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .finish()
}

/// SDL of the schema; needs no ledger.
pub fn schema_sdl() -> String {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .finish()
        .sdl()
}

#[derive(Default)]
pub struct QueryRoot;

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> HealthPayload {
        HealthPayload { ok: true }
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    #[instrument(name = "graphql.session", skip_all)]
    async fn session(&self, ctx: &Context<'_>) -> async_graphql::Result<SessionPayload> {
        let data = graphql_data(ctx)?;
        Ok(SessionPayload::from_requester(
            data,
            ctx.data_opt::<RequestUser>(),
        ))
    }

    #[instrument(name = "graphql.employees", skip_all)]
    async fn employees(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<EmployeeNode>> {
        let ledger = require_session(ctx)?.lock().await;
        Ok(ledger.visible_rows().map(EmployeeNode::from).collect())
    }

    #[instrument(name = "graphql.total_payroll", skip_all)]
    async fn total_payroll(&self, ctx: &Context<'_>) -> async_graphql::Result<f64> {
        let ledger = require_session(ctx)?.lock().await;
        Ok(ledger.total_payroll())
    }

    #[instrument(name = "graphql.tax_rate", skip_all)]
    async fn tax_rate(&self, ctx: &Context<'_>) -> async_graphql::Result<f64> {
        let ledger = require_session(ctx)?.lock().await;
        Ok(ledger.tax_policy().rate())
    }

    /// The report text for the rows currently displayed.
    #[instrument(name = "graphql.report", skip_all)]
    async fn report(&self, ctx: &Context<'_>) -> async_graphql::Result<String> {
        let ledger = require_session(ctx)?.lock().await;
        Ok(ledger.report().render())
    }
}

#[Object]
impl MutationRoot {
    #[instrument(name = "graphql.login", skip_all, fields(username = %username))]
    async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> async_graphql::Result<AuthPayload> {
        let data = graphql_data(ctx)?;
        Ok(AuthPayload::attempt(data, &username, &password))
    }

    #[instrument(name = "graphql.add_employee", skip_all)]
    async fn add_employee(
        &self,
        ctx: &Context<'_>,
        name: String,
        hours: String,
        rate: String,
    ) -> async_graphql::Result<EmployeeNode> {
        let mut ledger = require_session(ctx)?.lock().await;
        let row = ledger
            .add_employee(&name, &hours, &rate)
            .await
            .map_err(ledger_error)?;
        Ok(EmployeeNode::from(&row))
    }

    /// Deletes the record whose id is given; omitting `id` means nothing is
    /// selected.
    #[instrument(name = "graphql.delete_employee", skip_all)]
    async fn delete_employee(
        &self,
        ctx: &Context<'_>,
        id: Option<i32>,
    ) -> async_graphql::Result<DeletedEmployee> {
        let mut ledger = require_session(ctx)?.lock().await;
        let removed = ledger.delete_selected(id).await.map_err(ledger_error)?;
        Ok(DeletedEmployee::from(removed))
    }

    #[instrument(name = "graphql.filter_employees", skip_all)]
    async fn filter_employees(
        &self,
        ctx: &Context<'_>,
        q: String,
    ) -> async_graphql::Result<Vec<EmployeeNode>> {
        let mut ledger = require_session(ctx)?.lock().await;
        ledger.filter(&q);
        Ok(ledger.visible_rows().map(EmployeeNode::from).collect())
    }

    #[instrument(name = "graphql.reset_filter", skip_all)]
    async fn reset_filter(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<EmployeeNode>> {
        let mut ledger = require_session(ctx)?.lock().await;
        ledger.reset_filter();
        Ok(ledger.visible_rows().map(EmployeeNode::from).collect())
    }

    /// Writes the report on the server host. A missing `path` cancels the
    /// export and returns null.
    #[instrument(name = "graphql.export_report", skip_all)]
    async fn export_report(
        &self,
        ctx: &Context<'_>,
        path: Option<String>,
    ) -> async_graphql::Result<Option<ExportPayload>> {
        let ledger = require_session(ctx)?.lock().await;
        let destination = path
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let report = ledger
            .export_report(destination.as_deref())
            .map_err(ledger_error)?;
        Ok(destination
            .zip(report)
            .map(|(path, report)| ExportPayload::new(&path, &report)))
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

fn graphql_data<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
        .map_err(|_| internal_error(anyhow::anyhow!("missing schema data")))
}

fn require_session<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a SharedLedger> {
    let data = graphql_data(ctx)?;
    if data.gate.is_some() && ctx.data_opt::<RequestUser>().is_none() {
        return Err(ApiError::Unauthenticated.extend());
    }
    Ok(&data.ledger)
}

fn ledger_error(err: LedgerError) -> async_graphql::Error {
    match err {
        LedgerError::Validation(inner) => ApiError::Validation(inner.to_string()).extend(),
        LedgerError::NoSelection => ApiError::NoSelection.extend(),
        LedgerError::NotFound(_) => ApiError::NotFound.extend(),
        other => internal_error(other),
    }
}

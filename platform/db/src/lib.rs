//! Database primitives: connection settings, connect, and the employee store.

use entity::employees;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Statement, TransactionTrait,
};
use thiserror::Error;
use tracing::debug;

/// Shared connection alias. sea-orm pools internally, so clones are cheap.
pub type DbPool = DatabaseConnection;

/// File-backed store next to the working directory, created when absent.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://payroll.db?mode=rwc";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open database {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: DbErr,
    },
    #[error("database error: {0}")]
    Query(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    url: String,
    sqlx_logging: bool,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sqlx_logging: false,
        }
    }

    /// Reads `PAYROLL_DATABASE_URL`, then `DATABASE_URL`, falling back to
    /// [`DEFAULT_DATABASE_URL`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("PAYROLL_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let sqlx_logging = lookup("SQLX_LOGGING")
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { url, sqlx_logging }
    }

    pub fn database_url(&self) -> &str {
        &self.url
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url();
    let mut options = ConnectOptions::new(url);
    options.sqlx_logging(settings.sqlx_logging);
    let pool = Database::connect(options)
        .await
        .map_err(|source| DbError::Connect {
            url: url.to_string(),
            source,
        })?;
    debug!(%url, "database connection opened");
    Ok(pool)
}

/// Cheap liveness probe used by the health endpoint.
pub async fn ping<C: ConnectionTrait>(conn: &C) -> bool {
    conn.execute(Statement::from_string(
        conn.get_database_backend(),
        "SELECT 1".to_string(),
    ))
    .await
    .is_ok()
}

/// All employees in id order, which is also display order.
pub async fn list_employees<C: ConnectionTrait>(conn: &C) -> DbResult<Vec<employees::Model>> {
    let rows = employees::Entity::find()
        .order_by_asc(employees::Column::Id)
        .all(conn)
        .await?;
    Ok(rows)
}

/// Inserts a row and lets SQLite assign the next id. Returns that id.
pub async fn insert_employee<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    hours: i32,
    rate: f64,
) -> DbResult<i32> {
    let model = employees::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        hours: Set(hours),
        rate: Set(rate),
    };
    let result = employees::Entity::insert(model).exec(conn).await?;
    debug!(id = result.last_insert_id, "employee row inserted");
    Ok(result.last_insert_id)
}

/// Deletes by id. Returns whether a row was removed.
pub async fn delete_employee<C: ConnectionTrait>(conn: &C, id: i32) -> DbResult<bool> {
    let result = employees::Entity::delete_by_id(id).exec(conn).await?;
    Ok(result.rows_affected > 0)
}

/// Applies `(old, new)` id moves in one transaction, in the given order.
///
/// Callers pass moves in ascending `old` order with `new <= old`, so no move
/// ever lands on an id that is still occupied.
pub async fn renumber_employees(pool: &DbPool, moves: &[(i32, i32)]) -> DbResult<()> {
    if moves.is_empty() {
        return Ok(());
    }
    let txn = pool.begin().await?;
    for &(old, new) in moves {
        employees::Entity::update_many()
            .col_expr(employees::Column::Id, Expr::value(new))
            .filter(employees::Column::Id.eq(old))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;
    debug!(moved = moves.len(), "employee ids renumbered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};

    async fn memory_pool() -> DbPool {
        let pool = connect(&DatabaseSettings::new("sqlite::memory:"))
            .await
            .unwrap();
        Migrator::up(&pool, None).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let pool = memory_pool().await;
        let first = insert_employee(&pool, "Ada", 10, 12.5).await.unwrap();
        let second = insert_employee(&pool, "Grace", 4, 30.0).await.unwrap();
        assert_eq!((first, second), (1, 2));

        let rows = list_employees(&pool).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Ada");
        assert_eq!(rows[1].rate, 30.0);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let pool = memory_pool().await;
        let id = insert_employee(&pool, "Ada", 10, 12.5).await.unwrap();
        assert!(delete_employee(&pool, id).await.unwrap());
        assert!(!delete_employee(&pool, id).await.unwrap());
        assert!(list_employees(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn renumber_compacts_gaps() {
        let pool = memory_pool().await;
        for name in ["a", "b", "c", "d"] {
            insert_employee(&pool, name, 1, 1.0).await.unwrap();
        }
        delete_employee(&pool, 2).await.unwrap();

        renumber_employees(&pool, &[(3, 2), (4, 3)]).await.unwrap();

        let rows = list_employees(&pool).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|row| row.id).collect();
        let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(names, vec!["a", "c", "d"]);
    }

    #[tokio::test]
    async fn ping_succeeds_on_open_connection() {
        let pool = memory_pool().await;
        assert!(ping(&pool).await);
    }

    #[test]
    fn settings_default_to_local_file() {
        let settings = DatabaseSettings::from_lookup(|_| None);
        assert_eq!(settings.database_url(), DEFAULT_DATABASE_URL);
        assert!(!settings.sqlx_logging);
    }

    #[test]
    fn payroll_url_takes_precedence() {
        let settings = DatabaseSettings::from_lookup(|key| match key {
            "PAYROLL_DATABASE_URL" => Some("sqlite://a.db".into()),
            "DATABASE_URL" => Some("sqlite://b.db".into()),
            "SQLX_LOGGING" => Some("TRUE".into()),
            _ => None,
        });
        assert_eq!(settings.database_url(), "sqlite://a.db");
        assert!(settings.sqlx_logging);

        let fallback = DatabaseSettings::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "sqlite://b.db".to_string())
        });
        assert_eq!(fallback.database_url(), "sqlite://b.db");
    }
}

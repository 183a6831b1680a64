// PostgreSQL target store
//
// Extract cells are bound as text and cast to the declared column type in
// the statement itself, so one code path serves every table. Column types are
// read from the catalog when a writer is opened.

use super::{quote_column, quote_ident, StoreResult, TableWriter, TargetStore};
use crate::batch::Row;
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Postgres caps a statement at 65535 bind parameters
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Store backed by a `sqlx` Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool without connecting; the first probe opens the connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        // a writer transaction plus one connection for probes and counts
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_lazy_with(options);

        info!(url = %config.redacted_url(), "Database pool configured");

        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn column_types(&self, table: &str) -> StoreResult<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT a.attname::text, format_type(a.atttypid, a.atttypmod)
            FROM pg_attribute a
            WHERE a.attrelid = to_regclass($1)
              AND a.attnum > 0
              AND NOT a.attisdropped
            "#,
        )
        .bind(quote_ident(table))
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(StoreError::UnknownTable(table.to_string()));
        }

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl TargetStore for PgStore {
    async fn probe(&self) -> StoreResult<String> {
        let now: String = sqlx::query_scalar("SELECT NOW()::text")
            .fetch_one(&self.pool)
            .await?;
        Ok(now)
    }

    async fn open_writer<'a>(
        &'a self,
        table: &'a str,
        transactional: bool,
    ) -> StoreResult<Box<dyn TableWriter + 'a>> {
        let column_types = self.column_types(table).await?;
        let target = if transactional {
            WriteTarget::Transaction(Some(self.pool.begin().await?))
        } else {
            WriteTarget::Pool(&self.pool)
        };

        Ok(Box::new(PgWriter {
            table,
            column_types,
            target,
        }))
    }

    async fn count_rows(&self, table: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_all(&self, table: &str) -> StoreResult<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}", quote_ident(table)))
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }
}

enum WriteTarget<'a> {
    Pool(&'a PgPool),
    Transaction(Option<Transaction<'static, Postgres>>),
}

struct PgWriter<'a> {
    table: &'a str,
    column_types: HashMap<String, String>,
    target: WriteTarget<'a>,
}

#[async_trait]
impl<'a> TableWriter for PgWriter<'a> {
    async fn append(&mut self, columns: &[String], rows: &[Row]) -> StoreResult<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let casts = columns
            .iter()
            .map(|c| {
                self.column_types
                    .get(c)
                    .map(String::as_str)
                    .ok_or_else(|| StoreError::UnknownColumn {
                        table: self.table.to_string(),
                        column: c.clone(),
                    })
            })
            .collect::<StoreResult<Vec<&str>>>()?;

        let column_list = columns.iter().map(|c| quote_column(c)).collect::<Vec<_>>().join(", ");
        let rows_per_statement = (MAX_BIND_PARAMS / columns.len()).max(1);
        let mut written = 0;

        for part in rows.chunks(rows_per_statement) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                quote_ident(self.table),
                column_list
            ));

            query_builder.push_values(part, |mut b, row| {
                for (value, ty) in row.iter().zip(&casts) {
                    b.push("CAST(")
                        .push_bind_unseparated(value.to_sql_text())
                        .push_unseparated(format!(" AS {})", ty));
                }
            });

            let result = match &mut self.target {
                WriteTarget::Pool(pool) => query_builder.build().execute(*pool).await,
                WriteTarget::Transaction(Some(tx)) => query_builder.build().execute(&mut **tx).await,
                WriteTarget::Transaction(None) => {
                    return Err(StoreError::Unavailable(format!(
                        "writer for '{}' already finished",
                        self.table
                    )))
                },
            }
            .map_err(classify)?;

            written += result.rows_affected();
        }

        debug!(table = %self.table, rows = written, "Statement executed");
        Ok(written)
    }

    async fn finish(&mut self) -> StoreResult<()> {
        if let WriteTarget::Transaction(tx) = &mut self.target {
            if let Some(tx) = tx.take() {
                tx.commit().await?;
            }
        }
        Ok(())
    }
}

/// Integrity violations get their own variant so reports name them plainly.
fn classify(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        match db_err.kind() {
            ErrorKind::ForeignKeyViolation
            | ErrorKind::UniqueViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                return StoreError::ConstraintViolation(db_err.message().to_string());
            },
            _ => {},
        }
    }
    StoreError::Sqlx(err)
}

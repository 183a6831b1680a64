//! Target store seam
//!
//! The loader only needs four things from the database: a round-trip probe,
//! an append-only writer per table, a row count, and (for `--purge`) a way to
//! empty a table. [`PgStore`] implements them over a `sqlx` pool; tests plug
//! in an in-memory store.

pub mod postgres;

pub use postgres::PgStore;

use crate::batch::Row;
use crate::error::StoreError;
use async_trait::async_trait;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Trivial round trip; returns the server clock as text.
    async fn probe(&self) -> StoreResult<String>;

    /// Open an append-only writer for `table`.
    ///
    /// With `transactional` set, nothing appended becomes visible unless
    /// [`TableWriter::finish`] succeeds. Otherwise each append is committed as
    /// soon as it returns.
    async fn open_writer<'a>(
        &'a self,
        table: &'a str,
        transactional: bool,
    ) -> StoreResult<Box<dyn TableWriter + 'a>>;

    /// `SELECT COUNT(*)` for `table`.
    async fn count_rows(&self, table: &str) -> StoreResult<i64>;

    /// Delete every row of `table`; returns the number of rows removed.
    async fn delete_all(&self, table: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait TableWriter: Send {
    /// Append one chunk as a single statement. Returns rows written.
    async fn append(&mut self, columns: &[String], rows: &[Row]) -> StoreResult<u64>;

    /// Commit (transactional writers) or release the writer.
    async fn finish(&mut self) -> StoreResult<()>;
}

/// Double-quote a table name, keeping `schema.table` qualification.
pub fn quote_ident(name: &str) -> String {
    name.split('.').map(quote_column).collect::<Vec<_>>().join(".")
}

/// Double-quote a single column name. Dots are part of the name.
pub fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("lotes"), "\"lotes\"");
        assert_eq!(quote_ident("public.lotes"), "\"public\".\"lotes\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_column_keeps_dots() {
        assert_eq!(quote_column("precio.unit"), "\"precio.unit\"");
        assert_eq!(quote_column("fecha_cad"), "\"fecha_cad\"");
        assert_eq!(quote_column("a\"b"), "\"a\"\"b\"");
    }
}

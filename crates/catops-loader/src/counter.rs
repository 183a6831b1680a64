//! Row Counter
//!
//! Post-load verification. A failed count is reported and nothing more: the
//! rows it would have counted are already committed.

use crate::error::{LoadError, Result};
use crate::store::TargetStore;

/// Current number of rows in `table`.
pub async fn count_rows(table: &str, store: &dyn TargetStore) -> Result<i64> {
    store
        .count_rows(table)
        .await
        .map_err(|e| LoadError::count(table, e))
}

//! Bulk Inserter
//!
//! Appends a normalized batch to its table in fixed-size chunks, one
//! statement per chunk, in order. Never upserts, never retries. Without a
//! transaction, chunks that went in before a failing one stay committed.

use crate::batch::RowBatch;
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{LoadError, Result};
use crate::store::TargetStore;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct BulkInserter {
    chunk_size: usize,
    transactional: bool,
}

impl Default for BulkInserter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            transactional: false,
        }
    }
}

impl BulkInserter {
    /// A zero chunk size is treated as one row per chunk.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            transactional: false,
        }
    }

    pub fn transactional(mut self, enabled: bool) -> Self {
        self.transactional = enabled;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Append `batch` to `table`; returns the number of rows inserted.
    pub async fn insert(&self, batch: &RowBatch, table: &str, store: &dyn TargetStore) -> Result<u64> {
        if batch.is_empty() {
            warn!(table = %table, "Empty batch, nothing inserted");
            return Ok(0);
        }

        let mut writer = store
            .open_writer(table, self.transactional)
            .await
            .map_err(|e| LoadError::insert(table, e))?;

        let total_chunks = batch.len().div_ceil(self.chunk_size);
        let mut inserted = 0u64;

        for (chunk_idx, chunk) in batch.rows().chunks(self.chunk_size).enumerate() {
            debug!(
                table = %table,
                "Inserting chunk {} / {} ({} rows)",
                chunk_idx + 1,
                total_chunks,
                chunk.len()
            );

            inserted += writer
                .append(batch.columns(), chunk)
                .await
                .map_err(|e| LoadError::insert(table, e))?;
        }

        writer.finish().await.map_err(|e| LoadError::insert(table, e))?;

        Ok(inserted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::batch::{Row, Value};
    use crate::error::StoreError;
    use crate::store::{StoreResult, TableWriter};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records statement sizes; fails the statement with index `fail_at`.
    #[derive(Default)]
    struct ChunkRecorder {
        statements: Mutex<Vec<usize>>,
        fail_at: Option<usize>,
    }

    struct RecorderWriter<'a> {
        store: &'a ChunkRecorder,
    }

    #[async_trait]
    impl TargetStore for ChunkRecorder {
        async fn probe(&self) -> StoreResult<String> {
            Ok("now".into())
        }

        async fn open_writer<'a>(
            &'a self,
            _table: &'a str,
            _transactional: bool,
        ) -> StoreResult<Box<dyn TableWriter + 'a>> {
            Ok(Box::new(RecorderWriter { store: self }))
        }

        async fn count_rows(&self, _table: &str) -> StoreResult<i64> {
            Ok(self.statements.lock().unwrap().iter().sum::<usize>() as i64)
        }

        async fn delete_all(&self, _table: &str) -> StoreResult<u64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl<'a> TableWriter for RecorderWriter<'a> {
        async fn append(&mut self, _columns: &[String], rows: &[Row]) -> StoreResult<u64> {
            let mut statements = self.store.statements.lock().unwrap();
            if Some(statements.len()) == self.store.fail_at {
                return Err(StoreError::ConstraintViolation("fk".into()));
            }
            statements.push(rows.len());
            Ok(rows.len() as u64)
        }

        async fn finish(&mut self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn batch(rows: usize) -> RowBatch {
        RowBatch::new(
            vec!["id".into()],
            (0..rows).map(|i| vec![Value::Integer(i as i64)]).collect(),
        )
    }

    #[tokio::test]
    async fn test_rows_sent_in_fixed_size_chunks() {
        let store = ChunkRecorder::default();
        let inserted = BulkInserter::new(1000).insert(&batch(2500), "t", &store).await.unwrap();
        assert_eq!(inserted, 2500);
        assert_eq!(*store.statements.lock().unwrap(), vec![1000, 1000, 500]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = ChunkRecorder::default();
        let inserted = BulkInserter::default().insert(&batch(0), "t", &store).await.unwrap();
        assert_eq!(inserted, 0);
        assert!(store.statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_chunks_and_names_table() {
        let store = ChunkRecorder {
            fail_at: Some(1),
            ..Default::default()
        };
        let err = BulkInserter::new(2).insert(&batch(5), "lotes", &store).await.unwrap_err();
        match err {
            LoadError::Insert { table, .. } => assert_eq!(table, "lotes"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*store.statements.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_zero_chunk_size_clamped() {
        assert_eq!(BulkInserter::new(0).chunk_size(), 1);
    }
}

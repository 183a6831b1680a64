// Load Executor
//
// Runs a load plan against a target store:
// 1. probe the store; failure here is the only thing that ends a run early
// 2. optionally purge plan tables, dependents first
// 3. per entry, in plan order: resolve the extract, read, normalize, insert,
//    count. Any failure is recorded against the entry and the loop moves on
//
// Entries are processed one at a time. Nothing is rolled back at the end of
// a run; each table keeps whatever was committed for it.

use crate::batch::RowBatch;
use crate::config::LoaderConfig;
use crate::counter::count_rows;
use crate::error::{LoadError, Result};
use crate::inserter::BulkInserter;
use crate::normalize::{normalize, NormalizationReport};
use crate::plan::{LoadPlan, LoadPlanEntry};
use crate::reader::ExtractReader;
use crate::store::TargetStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What happened to one plan entry
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Loaded {
        inserted: u64,
        /// Row count after the load; `None` when the count query failed
        total: Option<i64>,
        normalization: NormalizationReport,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub source: String,
    pub table: String,
    pub outcome: EntryOutcome,
}

/// Outcome of a whole run, one report per plan entry in plan order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub server_time: String,
    pub entries: Vec<EntryReport>,
}

impl RunReport {
    pub fn entry(&self, table: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.table == table)
    }

    pub fn loaded(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Loaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> catops_common::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

pub struct LoadExecutor<'c> {
    config: &'c LoaderConfig,
    reader: ExtractReader,
    inserter: BulkInserter,
}

impl<'c> LoadExecutor<'c> {
    pub fn new(config: &'c LoaderConfig) -> Self {
        Self {
            config,
            reader: ExtractReader::new(),
            inserter: BulkInserter::new(config.chunk_size).transactional(config.transactional),
        }
    }

    pub fn with_reader(mut self, reader: ExtractReader) -> Self {
        self.reader = reader;
        self
    }

    /// Where an entry's extract is expected
    pub fn source_path(&self, entry: &LoadPlanEntry) -> PathBuf {
        self.config.data_dir.join(entry.source)
    }

    /// Execute `plan`. Only a failed connectivity probe returns `Err`.
    pub async fn run(&self, plan: &LoadPlan, store: &dyn TargetStore) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("load_run", %run_id);

        async move {
            info!("Connecting to target database");
            let server_time = match store.probe().await {
                Ok(now) => now,
                Err(e) => {
                    error!(error = %e, "Connectivity check failed, aborting run");
                    return Err(LoadError::Connectivity(e));
                },
            };
            info!(server_time = %server_time, "Connection OK");

            if self.config.purge {
                self.purge(plan, store).await;
            }

            let mut entries = Vec::with_capacity(plan.len());
            for entry in plan.entries() {
                let outcome = self.run_entry(entry, store).await;
                entries.push(EntryReport {
                    source: entry.source.to_string(),
                    table: entry.table.to_string(),
                    outcome,
                });
            }

            let report = RunReport {
                run_id,
                server_time,
                entries,
            };

            info!(
                loaded = report.loaded(),
                skipped = report.skipped(),
                failed = report.failed(),
                "Load run finished"
            );

            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run_entry(&self, entry: &LoadPlanEntry, store: &dyn TargetStore) -> EntryOutcome {
        let path = self.source_path(entry);

        if !path.exists() {
            if entry.optional {
                info!(table = entry.table, source = entry.source, "Extract not found, skipping optional table");
                return EntryOutcome::Skipped {
                    reason: format!("extract not found: {}", path.display()),
                };
            }
            let err = LoadError::SourceNotFound { path };
            error!(table = entry.table, source = entry.source, error = %err, "Load failed");
            return EntryOutcome::Failed {
                error: err.to_string(),
            };
        }

        info!(table = entry.table, source = entry.source, "Loading {} -> {}", entry.source, entry.table);

        let (inserted, normalization) = match self.load_entry(entry, &path, store).await {
            Ok(done) => done,
            Err(err) => {
                error!(table = entry.table, source = entry.source, error = %err, "Load failed");
                return EntryOutcome::Failed {
                    error: err.to_string(),
                };
            },
        };

        if inserted > 0 {
            info!(table = entry.table, inserted, "Rows inserted");
        }

        let total = match count_rows(entry.table, store).await {
            Ok(total) => {
                info!(table = entry.table, total, "{}: total now {} rows", entry.table, total);
                Some(total)
            },
            Err(err) => {
                warn!(table = entry.table, error = %err, "Row count unavailable");
                None
            },
        };

        EntryOutcome::Loaded {
            inserted,
            total,
            normalization,
        }
    }

    /// Read, normalize and insert one extract.
    async fn load_entry(
        &self,
        entry: &LoadPlanEntry,
        path: &Path,
        store: &dyn TargetStore,
    ) -> Result<(u64, NormalizationReport)> {
        let raw: RowBatch = self.reader.read_path(path)?;
        let (batch, report) = normalize(raw, &entry.date_columns, entry.rule.as_ref());
        let inserted = self.inserter.insert(&batch, entry.table, store).await?;
        Ok((inserted, report))
    }

    /// Empty plan tables in reverse order so dependents go first.
    async fn purge(&self, plan: &LoadPlan, store: &dyn TargetStore) {
        info!("Purging plan tables before load");
        for entry in plan.entries().iter().rev() {
            match store.delete_all(entry.table).await {
                Ok(deleted) => info!(table = entry.table, deleted, "Table purged"),
                Err(e) => warn!(table = entry.table, error = %e, "Purge failed, continuing"),
            }
        }
    }
}

//! Catering Ops Loader
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads the catering_ops extract files into their PostgreSQL schema in
//! foreign-key order, one table at a time, continuing past tables that fail.
//!
//! - [`plan`]: the ordered extract -> table plan and its dependency checks
//! - [`reader`]: delimited extract parsing into untyped row batches
//! - [`normalize`]: per-table coercion of numbers and dates, nulls for bad values
//! - [`inserter`]: chunked append-only inserts
//! - [`counter`]: post-load row counts
//! - [`executor`]: the run loop with per-entry fault isolation
//! - [`store`]: the database seam and its Postgres implementation
//!
//! # Example
//!
//! ```no_run
//! use catops_loader::{config::LoaderConfig, executor::LoadExecutor, plan::LoadPlan, store::PgStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoaderConfig::from_env()?;
//!     let store = PgStore::connect_lazy(&config.database);
//!     let plan = LoadPlan::catering_ops()?;
//!     let report = LoadExecutor::new(&config).run(&plan, &store).await?;
//!     println!("{} tables loaded", report.loaded());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod counter;
pub mod error;
pub mod executor;
pub mod inserter;
pub mod normalize;
pub mod plan;
pub mod reader;
pub mod store;

pub use error::{LoadError, Result, StoreError};

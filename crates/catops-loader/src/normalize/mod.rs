// Row Normalization
//
// Turns an untyped extract batch into values the target columns accept:
// - blank cells are already nulls when they arrive from the reader
// - numeric columns are coerced, unparseable values become null
// - date-like columns are canonicalized, unparseable values become null
//
// Nothing here fails. Coercion losses are counted per column in a
// `NormalizationReport` so they stay visible in the run output.

pub mod dates;

use crate::batch::{RowBatch, Value};
use dates::parse_date_like;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// How one column is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Integer if possible, float otherwise
    Numeric,
    /// `YYYY-MM-DD`, time of day dropped
    CalendarDate,
    /// `YYYY-MM-DD HH:MM:SS`
    DateTime,
    /// Date when the source had no time of day, date-time otherwise
    DateLike,
}

/// Table-specific coercions, applied on top of the entry's date-like columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationRule {
    name: &'static str,
    columns: Vec<(&'static str, ColumnKind)>,
}

impl NormalizationRule {
    pub fn new(name: &'static str, columns: Vec<(&'static str, ColumnKind)>) -> Self {
        Self { name, columns }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn columns(&self) -> &[(&'static str, ColumnKind)] {
        &self.columns
    }

    /// Production lots: ids and quantities are numeric, production and expiry are plain dates
    pub fn batch_expiry() -> Self {
        Self::new(
            "batch_expiry",
            vec![
                ("product_id", ColumnKind::Numeric),
                ("cantidad_inicial", ColumnKind::Numeric),
                ("fecha_prod", ColumnKind::CalendarDate),
                ("fecha_cad", ColumnKind::CalendarDate),
            ],
        )
    }

    /// Flights: departure is a full timestamp
    pub fn scheduled_event() -> Self {
        Self::new("scheduled_event", vec![("fecha_vuelo", ColumnKind::DateTime)])
    }

    /// Stock movements: movement time is a full timestamp
    pub fn inventory_movement() -> Self {
        Self::new("inventory_movement", vec![("fecha_mov", ColumnKind::DateTime)])
    }
}

/// Null accounting for one column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnStats {
    /// Cells that were blank or missing in the extract
    pub absent: usize,
    /// Cells that had a value but failed coercion
    pub coerced_to_null: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub rows: usize,
    pub columns: BTreeMap<String, ColumnStats>,
}

impl NormalizationReport {
    pub fn coerced_to_null(&self) -> usize {
        self.columns.values().map(|c| c.coerced_to_null).sum()
    }

    pub fn absent(&self) -> usize {
        self.columns.values().map(|c| c.absent).sum()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.get(name)
    }
}

/// Resolve the coercion plan for a batch: the table rule first, then any
/// remaining date-like columns. Columns not in the batch are skipped.
fn column_plan(
    batch: &RowBatch,
    date_columns: &[&str],
    rule: Option<&NormalizationRule>,
) -> Vec<(usize, ColumnKind)> {
    let mut plan: Vec<(usize, ColumnKind)> = Vec::new();

    if let Some(rule) = rule {
        for (name, kind) in rule.columns() {
            if let Some(idx) = batch.column_index(name) {
                plan.push((idx, *kind));
            }
        }
    }

    for name in date_columns {
        if let Some(idx) = batch.column_index(name) {
            if !plan.iter().any(|(i, _)| *i == idx) {
                plan.push((idx, ColumnKind::DateLike));
            }
        }
    }

    plan
}

/// Normalize a raw batch for one table.
pub fn normalize(
    mut batch: RowBatch,
    date_columns: &[&str],
    rule: Option<&NormalizationRule>,
) -> (RowBatch, NormalizationReport) {
    let mut report = NormalizationReport {
        rows: batch.len(),
        columns: BTreeMap::new(),
    };

    for (idx, column) in batch.columns().iter().enumerate() {
        let absent = batch.rows().iter().filter(|r| r[idx].is_null()).count();
        report.columns.insert(
            column.clone(),
            ColumnStats {
                absent,
                coerced_to_null: 0,
            },
        );
    }

    for (idx, kind) in column_plan(&batch, date_columns, rule) {
        let mut failed = 0usize;
        batch.map_column(idx, |cell| {
            let coerced = coerce(cell, kind);
            if coerced.is_null() && !cell.is_null() {
                failed += 1;
            }
            *cell = coerced;
        });

        let column = &batch.columns()[idx];
        debug!(column = %column, kind = ?kind, failed, "Column coerced");
        if let Some(stats) = report.columns.get_mut(column) {
            stats.coerced_to_null = failed;
        }
    }

    let coerced = report.coerced_to_null();
    if coerced > 0 {
        let columns: Vec<&str> = report
            .columns
            .iter()
            .filter(|(_, s)| s.coerced_to_null > 0)
            .map(|(c, _)| c.as_str())
            .collect();
        warn!(
            rule = rule.map(|r| r.name()).unwrap_or("none"),
            coerced,
            columns = ?columns,
            "Unparseable values loaded as NULL"
        );
    }

    (batch, report)
}

fn coerce(cell: &Value, kind: ColumnKind) -> Value {
    let raw = match cell {
        Value::Null => return Value::Null,
        Value::Text(s) => s.as_str(),
        // already typed
        other => return coerce_typed(other, kind),
    };

    match kind {
        ColumnKind::Numeric => parse_numeric(raw),
        ColumnKind::CalendarDate => parse_date_like(raw)
            .map(|p| Value::Date(p.date()))
            .unwrap_or(Value::Null),
        ColumnKind::DateTime => parse_date_like(raw)
            .map(|p| Value::DateTime(p.date_time()))
            .unwrap_or(Value::Null),
        ColumnKind::DateLike => match parse_date_like(raw) {
            Some(dates::ParsedDate::Date(d)) => Value::Date(d),
            Some(dates::ParsedDate::DateTime(dt)) => Value::DateTime(dt),
            None => Value::Null,
        },
    }
}

fn coerce_typed(value: &Value, kind: ColumnKind) -> Value {
    match (kind, value) {
        (ColumnKind::Numeric, Value::Integer(_) | Value::Float(_)) => value.clone(),
        (ColumnKind::CalendarDate, Value::Date(_)) => value.clone(),
        (ColumnKind::CalendarDate, Value::DateTime(dt)) => Value::Date(dt.date()),
        (ColumnKind::DateTime, Value::DateTime(_)) => value.clone(),
        (ColumnKind::DateTime, Value::Date(d)) => Value::DateTime(d.and_time(chrono::NaiveTime::MIN)),
        (ColumnKind::DateLike, Value::Date(_) | Value::DateTime(_)) => value.clone(),
        _ => coerce(&Value::Text(value.to_string()), kind),
    }
}

fn parse_numeric(raw: &str) -> Value {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    match s.parse::<f64>() {
        Ok(x) if x.is_finite() => {
            if x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
                Value::Integer(x as i64)
            } else {
                Value::Float(x)
            }
        },
        _ => Value::Null,
    }
}

//! Test helpers for loader integration tests
//!
//! - [`MemoryStore`]: an in-memory [`TargetStore`] that enforces foreign keys
//!   the way the catering_ops schema does and records every statement
//! - [`ExtractDir`]: a temporary data directory with extract files
//! - [`LoaderConfig`] builders pointed at that directory

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use catops_loader::batch::Row;
use catops_loader::config::LoaderConfig;
use catops_loader::store::{StoreResult, TableWriter, TargetStore};
use catops_loader::StoreError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Column layout and foreign keys of one in-memory table
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<&'static str>,
    /// (column, referenced table, referenced column)
    pub foreign_keys: Vec<(&'static str, &'static str, &'static str)>,
}

impl TableSchema {
    pub fn new(columns: &[&'static str]) -> Self {
        Self {
            columns: columns.to_vec(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn fk(mut self, column: &'static str, table: &'static str, ref_column: &'static str) -> Self {
        self.foreign_keys.push((column, table, ref_column));
        self
    }
}

type StoredRow = HashMap<String, Option<String>>;

#[derive(Debug, Default)]
struct State {
    schemas: HashMap<String, TableSchema>,
    rows: HashMap<String, Vec<StoredRow>>,
    /// (table, rows) per committed statement, in execution order
    statements: Vec<(String, usize)>,
    failing_counts: HashSet<String>,
    /// open_writer, count_rows and delete_all calls, whatever their outcome
    table_calls: usize,
}

impl State {
    fn check_rows(&self, table: &str, columns: &[String], rows: &[Row], pending: &[StoredRow]) -> StoreResult<Vec<StoredRow>> {
        let schema = self
            .schemas
            .get(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))?;

        for column in columns {
            if !schema.columns.contains(&column.as_str()) {
                return Err(StoreError::UnknownColumn {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let stored: StoredRow = columns
                .iter()
                .cloned()
                .zip(row.iter().map(|v| v.to_sql_text()))
                .collect();

            for (column, ref_table, ref_column) in &schema.foreign_keys {
                let Some(Some(value)) = stored.get(*column) else {
                    continue;
                };
                let matches = |r: &StoredRow| r.get(*ref_column).and_then(Option::as_deref) == Some(value.as_str());
                let found = self.rows.get(*ref_table).into_iter().flatten().any(matches)
                    || (*ref_table == table && pending.iter().chain(out.iter()).any(matches));
                if !found {
                    return Err(StoreError::ConstraintViolation(format!(
                        "insert or update on table \"{}\" violates foreign key on {} -> {}.{} (value {})",
                        table, column, ref_table, ref_column, value
                    )));
                }
            }
            out.push(stored);
        }
        Ok(out)
    }

    fn commit(&mut self, table: &str, rows: Vec<StoredRow>) {
        self.statements.push((table.to_string(), rows.len()));
        self.rows.entry(table.to_string()).or_default().extend(rows);
    }
}

/// In-memory target store with foreign-key enforcement
pub struct MemoryStore {
    state: Mutex<State>,
    reachable: bool,
}

impl MemoryStore {
    pub fn new(schemas: Vec<(&'static str, TableSchema)>) -> Self {
        let state = State {
            schemas: schemas.into_iter().map(|(t, s)| (t.to_string(), s)).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            reachable: true,
        }
    }

    /// The catering_ops schema
    pub fn catering_ops() -> Self {
        Self::new(vec![
            ("empleados", TableSchema::new(&["empleado_id", "nombre", "puesto"])),
            ("productos", TableSchema::new(&["product_id", "nombre", "categoria", "precio"])),
            (
                "lotes",
                TableSchema::new(&["lot_id", "product_id", "cantidad_inicial", "fecha_prod", "fecha_cad"])
                    .fk("product_id", "productos", "product_id"),
            ),
            ("vuelos", TableSchema::new(&["flight_id", "origen", "destino", "fecha_vuelo"])),
            (
                "ventas",
                TableSchema::new(&["venta_id", "flight_id", "product_id", "lot_id", "cantidad"])
                    .fk("flight_id", "vuelos", "flight_id")
                    .fk("product_id", "productos", "product_id")
                    .fk("lot_id", "lotes", "lot_id"),
            ),
            (
                "inventario_mov",
                TableSchema::new(&[
                    "mov_id",
                    "lot_id",
                    "product_id",
                    "flight_id",
                    "empleado_id",
                    "tipo",
                    "cantidad",
                    "fecha_mov",
                ])
                .fk("lot_id", "lotes", "lot_id")
                .fk("product_id", "productos", "product_id")
                .fk("flight_id", "vuelos", "flight_id")
                .fk("empleado_id", "empleados", "empleado_id"),
            ),
            (
                "vuelos_empleados",
                TableSchema::new(&["flight_id", "empleado_id", "rol"])
                    .fk("flight_id", "vuelos", "flight_id")
                    .fk("empleado_id", "empleados", "empleado_id"),
            ),
        ])
    }

    /// A store whose connectivity probe always fails
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn fail_counts_for(self, table: &str) -> Self {
        self.state.lock().unwrap().failing_counts.insert(table.to_string());
        self
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().unwrap().rows.get(table).map_or(0, Vec::len)
    }

    /// Stored values of one column, in insertion order
    pub fn column(&self, table: &str, column: &str) -> Vec<Option<String>> {
        let state = self.state.lock().unwrap();
        state
            .rows
            .get(table)
            .map(|rows| rows.iter().map(|r| r.get(column).cloned().flatten()).collect())
            .unwrap_or_default()
    }

    /// Tables in the order their statements were committed, consecutive repeats collapsed
    pub fn insert_order(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut order: Vec<String> = Vec::new();
        for (table, _) in &state.statements {
            if order.last() != Some(table) {
                order.push(table.clone());
            }
        }
        order
    }

    pub fn statement_count(&self) -> usize {
        self.state.lock().unwrap().statements.len()
    }

    /// Number of table-level calls the store has seen
    pub fn table_calls(&self) -> usize {
        self.state.lock().unwrap().table_calls
    }
}

struct MemoryWriter<'a> {
    store: &'a MemoryStore,
    table: &'a str,
    transactional: bool,
    pending: Vec<StoredRow>,
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn probe(&self) -> StoreResult<String> {
        if !self.reachable {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok("2026-10-19 12:00:00+00".into())
    }

    async fn open_writer<'a>(
        &'a self,
        table: &'a str,
        transactional: bool,
    ) -> StoreResult<Box<dyn TableWriter + 'a>> {
        {
            let mut state = self.state.lock().unwrap();
            state.table_calls += 1;
            if !state.schemas.contains_key(table) {
                return Err(StoreError::UnknownTable(table.to_string()));
            }
        }
        Ok(Box::new(MemoryWriter {
            store: self,
            table,
            transactional,
            pending: Vec::new(),
        }))
    }

    async fn count_rows(&self, table: &str) -> StoreResult<i64> {
        let mut state = self.state.lock().unwrap();
        state.table_calls += 1;
        if state.failing_counts.contains(table) {
            return Err(StoreError::Unavailable("count timed out".into()));
        }
        Ok(state.rows.get(table).map_or(0, Vec::len) as i64)
    }

    async fn delete_all(&self, table: &str) -> StoreResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.table_calls += 1;
        Ok(state.rows.remove(table).map_or(0, |r| r.len() as u64))
    }
}

#[async_trait]
impl<'a> TableWriter for MemoryWriter<'a> {
    async fn append(&mut self, columns: &[String], rows: &[Row]) -> StoreResult<u64> {
        let mut state = self.store.state.lock().unwrap();
        let checked = state.check_rows(self.table, columns, rows, &self.pending)?;
        let written = checked.len() as u64;
        if self.transactional {
            self.pending.extend(checked);
        } else {
            state.commit(self.table, checked);
        }
        Ok(written)
    }

    async fn finish(&mut self) -> StoreResult<()> {
        if self.transactional && !self.pending.is_empty() {
            let rows = std::mem::take(&mut self.pending);
            self.store.state.lock().unwrap().commit(self.table, rows);
        }
        Ok(())
    }
}

/// Temporary directory of extract files
pub struct ExtractDir {
    dir: TempDir,
}

impl ExtractDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) -> &Self {
        std::fs::write(self.dir.path().join(name), contents).expect("Failed to write extract");
        self
    }

    pub fn config(&self) -> LoaderConfig {
        LoaderConfig {
            data_dir: self.path().to_path_buf(),
            ..LoaderConfig::default()
        }
    }
}

// ============================================================================
// Extract fixtures
// ============================================================================

pub const EMPLEADOS: &str = "empleado_id,nombre,puesto\n1,Ana Ruiz,supervisora\n2,Luis Paz,\n3,,auxiliar\n";

pub const PRODUCTOS: &str =
    "product_id,nombre,categoria,precio\n10,Agua 600ml,bebida,12.5\n11,Sandwich,alimento,45\n12,Galletas,,18\n";

pub const LOTES: &str = "lot_id,product_id,cantidad_inicial,fecha_prod,fecha_cad\n\
L1,10,500,2025-09-01,2026-03-01\n\
L2,11,120,2025-10-01 06:00:00,2025-10-05\n\
L3,12,n/d,2025-09-15,2026-01-15\n";

pub const VUELOS: &str = "flight_id,origen,destino,fecha_vuelo\n\
100,MTY,CDMX,2025-10-04 06:30:00\n\
101,CDMX,CUN,2025-10-04T09:15\n\
102,CUN,MTY,not scheduled\n";

pub const VENTAS: &str = "venta_id,flight_id,product_id,lot_id,cantidad\n\
1,100,10,L1,3\n\
2,101,11,,1\n";

pub const INVENTARIO_MOV: &str = "mov_id,lot_id,product_id,flight_id,empleado_id,tipo,cantidad,fecha_mov\n\
1,L1,10,100,1,salida,20,2025-10-04 05:00:00\n\
2,L2,11,,,merma,2,2025/10/04 07:30\n\
3,L3,12,,2,ajuste,1,ayer\n";

pub const VUELOS_EMPLEADOS: &str = "flight_id,empleado_id,rol\n100,1,jefa de cabina\n101,2,\n";

/// Write every extract of the catering_ops plan
pub fn write_full_extract_set(dir: &ExtractDir) {
    dir.write("empleados_preview.csv", EMPLEADOS)
        .write("productos_preview.csv", PRODUCTOS)
        .write("lotes_preview.csv", LOTES)
        .write("vuelos_preview.csv", VUELOS)
        .write("ventas_preview.csv", VENTAS)
        .write("inventario_mov_preview.csv", INVENTARIO_MOV)
        .write("vuelos_empleados_preview.csv", VUELOS_EMPLEADOS);
}

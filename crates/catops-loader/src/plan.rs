//! Load Plan
//!
//! The ordered list of extracts to load and the foreign keys between their
//! target tables. Order is what keeps referential integrity intact at insert
//! time, so a plan is checked when it is built: every table an entry points
//! at must be loaded at an earlier index.
//!
//! [`LoadPlan::derive`] goes the other way and computes an order from the
//! declared foreign keys, for plans assembled without a hand-written order.

use crate::normalize::NormalizationRule;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Table '{0}' appears more than once in the load plan")]
    DuplicateTable(String),

    #[error("Table '{table}' references '{references}', which is not part of the load plan")]
    UnknownDependency { table: String, references: String },

    #[error("Table '{table}' is loaded before '{references}', which it references")]
    OutOfOrder { table: String, references: String },

    #[error("Foreign keys form a cycle through table '{0}'")]
    Cycle(String),
}

/// One foreign key of a target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: &'static str,
    pub nullable: bool,
}

impl ForeignKey {
    pub fn required(column: &'static str, references: &'static str) -> Self {
        Self {
            column,
            references,
            nullable: false,
        }
    }

    pub fn nullable(column: &'static str, references: &'static str) -> Self {
        Self {
            column,
            references,
            nullable: true,
        }
    }
}

/// Extract -> table mapping with its coercion settings
#[derive(Debug, Clone)]
pub struct LoadPlanEntry {
    pub source: &'static str,
    pub table: &'static str,
    pub date_columns: Vec<&'static str>,
    pub rule: Option<NormalizationRule>,
    pub foreign_keys: Vec<ForeignKey>,
    /// A missing extract is skipped instead of reported as a failure
    pub optional: bool,
}

impl LoadPlanEntry {
    pub fn new(source: &'static str, table: &'static str) -> Self {
        Self {
            source,
            table,
            date_columns: Vec::new(),
            rule: None,
            foreign_keys: Vec::new(),
            optional: false,
        }
    }

    pub fn date_columns(mut self, columns: &[&'static str]) -> Self {
        self.date_columns = columns.to_vec();
        self
    }

    pub fn rule(mut self, rule: NormalizationRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn references(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Tables this entry must be loaded after (self references excluded)
    pub fn dependencies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.foreign_keys
            .iter()
            .map(|fk| fk.references)
            .filter(move |t| *t != self.table)
    }
}

/// Validated, immutable load order
#[derive(Debug, Clone)]
pub struct LoadPlan {
    entries: Vec<LoadPlanEntry>,
}

impl LoadPlan {
    /// Accept a hand-ordered plan after checking it is a valid topological order.
    pub fn new(entries: Vec<LoadPlanEntry>) -> Result<Self, PlanError> {
        let mut position: HashMap<&str, usize> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if position.insert(entry.table, idx).is_some() {
                return Err(PlanError::DuplicateTable(entry.table.to_string()));
            }
        }

        for (idx, entry) in entries.iter().enumerate() {
            for dep in entry.dependencies() {
                match position.get(dep) {
                    None => {
                        return Err(PlanError::UnknownDependency {
                            table: entry.table.to_string(),
                            references: dep.to_string(),
                        })
                    },
                    Some(&dep_idx) if dep_idx > idx => {
                        return Err(PlanError::OutOfOrder {
                            table: entry.table.to_string(),
                            references: dep.to_string(),
                        })
                    },
                    Some(_) => {},
                }
            }
        }

        Ok(Self { entries })
    }

    /// Order entries by their foreign keys. Independent entries keep their
    /// relative declaration order.
    pub fn derive(entries: Vec<LoadPlanEntry>) -> Result<Self, PlanError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            let node = graph.add_node(idx);
            if nodes.insert(entry.table, node).is_some() {
                return Err(PlanError::DuplicateTable(entry.table.to_string()));
            }
        }

        // edge: referenced table -> referencing table
        for entry in &entries {
            for dep in entry.dependencies() {
                let from = *nodes.get(dep).ok_or_else(|| PlanError::UnknownDependency {
                    table: entry.table.to_string(),
                    references: dep.to_string(),
                })?;
                graph.update_edge(from, nodes[entry.table], ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let idx = graph[cycle.node_id()];
            return Err(PlanError::Cycle(entries[idx].table.to_string()));
        }

        // Kahn's algorithm, smallest declaration index first
        let mut pending: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(&n, _)| Reverse(graph[n]))
            .collect();

        let mut order = Vec::with_capacity(entries.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            let node = NodeIndex::new(idx);
            for next in graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(deg) = pending.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse(graph[next]));
                    }
                }
            }
        }

        let mut slots: Vec<Option<LoadPlanEntry>> = entries.into_iter().map(Some).collect();
        let ordered = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();

        Self::new(ordered)
    }

    pub fn entries(&self) -> &[LoadPlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.table)
    }

    /// The fixed catering_ops plan.
    pub fn catering_ops() -> Result<Self, PlanError> {
        Self::new(catering_ops_entries())
    }
}

/// Entries of the catering_ops schema in dependency order
pub fn catering_ops_entries() -> Vec<LoadPlanEntry> {
    vec![
        // no incoming foreign keys
        LoadPlanEntry::new("empleados_preview.csv", "empleados"),
        LoadPlanEntry::new("productos_preview.csv", "productos"),
        LoadPlanEntry::new("lotes_preview.csv", "lotes")
            .date_columns(&["fecha_prod", "fecha_cad"])
            .rule(NormalizationRule::batch_expiry())
            .references(ForeignKey::required("product_id", "productos")),
        LoadPlanEntry::new("vuelos_preview.csv", "vuelos")
            .date_columns(&["fecha_vuelo"])
            .rule(NormalizationRule::scheduled_event()),
        LoadPlanEntry::new("ventas_preview.csv", "ventas")
            .references(ForeignKey::required("flight_id", "vuelos"))
            .references(ForeignKey::required("product_id", "productos"))
            .references(ForeignKey::nullable("lot_id", "lotes")),
        LoadPlanEntry::new("inventario_mov_preview.csv", "inventario_mov")
            .date_columns(&["fecha_mov"])
            .rule(NormalizationRule::inventory_movement())
            .references(ForeignKey::required("lot_id", "lotes"))
            .references(ForeignKey::required("product_id", "productos"))
            .references(ForeignKey::nullable("flight_id", "vuelos"))
            .references(ForeignKey::nullable("empleado_id", "empleados")),
        LoadPlanEntry::new("vuelos_empleados_preview.csv", "vuelos_empleados")
            .references(ForeignKey::required("flight_id", "vuelos"))
            .references(ForeignKey::required("empleado_id", "empleados"))
            .optional(),
    ]
}

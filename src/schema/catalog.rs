//! Catalog of tables and the foreign-key graph used for JOIN generation.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::sql::expr::{table_col, Expr, ExprExt};
use crate::sql::query::{Query, TableRef};

use super::{SchemaError, SchemaResult, Table};

/// One foreign-key hop: `from_table.from_column = to_table.to_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl JoinEdge {
    /// The ON condition of this hop.
    pub fn on_expr(&self) -> Expr {
        table_col(&self.from_table, &self.from_column)
            .eq(table_col(&self.to_table, &self.to_column))
    }
}

/// A sequence of hops, in join order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinPath {
    pub edges: Vec<JoinEdge>,
}

impl JoinPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Parent information for path reconstruction.
struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
}

/// Tables plus a directed graph with one edge per foreign key
/// (referencing table -> referenced table).
///
/// Join paths only follow foreign keys forward, so every hop is many-to-one
/// and joining never multiplies fact rows.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: Vec<Table>,
    graph: DiGraph<String, JoinEdge>,
    node_indices: HashMap<String, NodeIndex>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a set of tables.
    pub fn with_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut catalog = Self::new();
        catalog.tables = tables.into_iter().collect();
        catalog.rebuild_graph();
        catalog
    }

    /// Add a table, replacing any table with the same name.
    pub fn add_table(&mut self, table: Table) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
        self.rebuild_graph();
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    pub fn table(&self, name: &str) -> SchemaResult<&Table> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SchemaError::UnknownTable(name.into()))
    }

    /// Check that every foreign key points at a known table and column.
    pub fn validate(&self) -> SchemaResult<()> {
        for table in &self.tables {
            for fk in &table.foreign_keys {
                let target = self.table(&fk.references_table).map_err(|_| {
                    SchemaError::DanglingForeignKey {
                        table: table.name.clone(),
                        column: fk.column.clone(),
                        references: fk.references_table.clone(),
                    }
                })?;
                table.c(&fk.column)?;
                target.c(&fk.references_column)?;
            }
        }
        Ok(())
    }

    fn rebuild_graph(&mut self) {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for table in &self.tables {
            let idx = graph.add_node(table.name.clone());
            node_indices.insert(table.name.clone(), idx);
        }

        for table in &self.tables {
            let from_idx = node_indices[&table.name];
            for fk in &table.foreign_keys {
                // Edges to tables registered later appear on the next rebuild
                if let Some(&to_idx) = node_indices.get(&fk.references_table) {
                    graph.add_edge(
                        from_idx,
                        to_idx,
                        JoinEdge {
                            from_table: table.name.clone(),
                            from_column: fk.column.clone(),
                            to_table: fk.references_table.clone(),
                            to_column: fk.references_column.clone(),
                        },
                    );
                }
            }
        }

        self.graph = graph;
        self.node_indices = node_indices;
    }

    /// Find the shortest foreign-key path from `from` to `to` using BFS.
    pub fn find_path(&self, from: &str, to: &str) -> SchemaResult<JoinPath> {
        if from == to {
            return Ok(JoinPath::new());
        }

        let from_idx = *self
            .node_indices
            .get(from)
            .ok_or_else(|| SchemaError::UnknownTable(from.into()))?;
        let to_idx = *self
            .node_indices
            .get(to)
            .ok_or_else(|| SchemaError::UnknownTable(to.into()))?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        queue.push_back(from_idx);
        visited.insert(from_idx);

        while let Some(current) = queue.pop_front() {
            for edge_ref in self.graph.edges(current) {
                let neighbor = edge_ref.target();
                if visited.contains(&neighbor) {
                    continue;
                }

                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx: edge_ref.id(),
                    },
                );

                if neighbor == to_idx {
                    return Ok(self.reconstruct_path(from_idx, neighbor, &parents));
                }

                visited.insert(neighbor);
                queue.push_back(neighbor);
            }
        }

        Err(SchemaError::NoPath {
            from: from.into(),
            to: to.into(),
        })
    }

    fn reconstruct_path(
        &self,
        from_idx: NodeIndex,
        to_idx: NodeIndex,
        parents: &HashMap<NodeIndex, ParentInfo>,
    ) -> JoinPath {
        let mut edges = Vec::new();
        let mut current = to_idx;

        while current != from_idx {
            let info = &parents[&current];
            edges.push(self.graph[info.edge_idx].clone());
            current = info.parent;
        }

        edges.reverse();
        JoinPath { edges }
    }

    /// Shortest path to `target` from any of `sources` (the tables already in
    /// a FROM clause). Sources unknown to the catalog, such as subquery
    /// aliases, are skipped.
    pub fn join_path(&self, sources: &[String], target: &str) -> SchemaResult<JoinPath> {
        if sources.iter().any(|s| s == target) {
            return Ok(JoinPath::new());
        }

        let mut best: Option<JoinPath> = None;
        for source in sources.iter().filter(|s| self.contains(s)) {
            match self.find_path(source, target) {
                Ok(path) => {
                    if best.as_ref().map_or(true, |b| path.len() < b.len()) {
                        best = Some(path);
                    }
                }
                Err(SchemaError::NoPath { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        best.ok_or_else(|| SchemaError::NoPath {
            from: sources.join(", "),
            to: target.into(),
        })
    }

    /// Inner-join every table of `tables` missing from `present`, following
    /// foreign keys from the tables already joined. `present` is updated with
    /// each table joined along the way.
    pub fn extend_joins(
        &self,
        mut query: Query,
        present: &mut Vec<String>,
        tables: &[String],
    ) -> SchemaResult<Query> {
        for table in tables {
            if present.contains(table) {
                continue;
            }
            let path = self.join_path(present, table)?;
            for edge in path.edges {
                if present.contains(&edge.to_table) {
                    continue;
                }
                query = query.inner_join(TableRef::new(&edge.to_table), edge.on_expr());
                present.push(edge.to_table);
            }
        }
        Ok(query)
    }
}

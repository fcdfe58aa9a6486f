//! Schema Graph
//!
//! Directed graph over a catalog, one node per schema:
//! - `Inherits` edges run from a schema to its parent
//! - `Nested` edges run from a schema to the schema of a nested field
//!
//! Inheritance must be acyclic. Nesting may recurse; recursion is bounded
//! at call time by the instance itself and the configured depth limit.

use std::collections::HashMap;

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::diagnostics::Diagnostics;
use crate::schema::{SchemaCatalog, SchemaId};

/// Kind of relationship between two schemas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    Inherits,
    Nested { field: String },
}

#[derive(Debug, Clone)]
pub struct SchemaGraph {
    graph: DiGraph<SchemaId, EdgeKind>,
    node_indices: HashMap<SchemaId, NodeIndex>,
}

impl SchemaGraph {
    /// Build the graph, recording references to schemas outside the catalog
    pub fn from_catalog(catalog: &SchemaCatalog, diagnostics: &mut Diagnostics) -> Self {
        let mut graph = DiGraph::with_capacity(catalog.len(), catalog.len() * 2);
        let mut node_indices = HashMap::with_capacity(catalog.len());

        for schema in catalog.iter() {
            let idx = graph.add_node(schema.id.clone());
            node_indices.insert(schema.id.clone(), idx);
        }

        for schema in catalog.iter() {
            let from = node_indices[&schema.id];

            if let Some(parent) = &schema.parent {
                match node_indices.get(parent) {
                    Some(&to) => {
                        graph.add_edge(from, to, EdgeKind::Inherits);
                    }
                    None => diagnostics.unknown_schema(&schema.id, parent, "parent"),
                }
            }

            for (field, target) in schema.nested_schemas() {
                match node_indices.get(target) {
                    Some(&to) => {
                        graph.add_edge(from, to, EdgeKind::Nested { field: field.to_string() });
                    }
                    None => diagnostics.unknown_schema(&schema.id, target, &format!("field '{}'", field)),
                }
            }
        }

        Self { graph, node_indices }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Parent of a schema, if it has one in the catalog
    pub fn parent_of(&self, id: &str) -> Option<&SchemaId> {
        let idx = *self.node_indices.get(id)?;
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .find(|e| *e.weight() == EdgeKind::Inherits)
            .map(|e| &self.graph[e.target()])
    }

    /// Schemas that nest the given one, as `(owner, field)` pairs
    pub fn nested_by(&self, id: &str) -> Vec<(&SchemaId, &str)> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut owners: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|e| match e.weight() {
                EdgeKind::Nested { field } => Some((&self.graph[e.source()], field.as_str())),
                EdgeKind::Inherits => None,
            })
            .collect();
        owners.sort();
        owners
    }

    /// Strongly connected groups of the inheritance edges
    pub fn inheritance_cycles(&self) -> Vec<Vec<SchemaId>> {
        self.cyclic_groups(|e| *e == EdgeKind::Inherits)
    }

    /// Strongly connected groups of the nesting edges
    pub fn recursive_groups(&self) -> Vec<Vec<SchemaId>> {
        self.cyclic_groups(|e| matches!(e, EdgeKind::Nested { .. }))
    }

    /// Schemas ordered so every parent precedes its children.
    ///
    /// Falls back to catalog order when inheritance is cyclic.
    pub fn synthesis_order(&self) -> Vec<SchemaId> {
        let inherits = self.subgraph(|e| *e == EdgeKind::Inherits);
        match toposort(&inherits, None) {
            Ok(order) => order.into_iter().rev().map(|idx| inherits[idx].clone()).collect(),
            Err(_) => self.graph.node_weights().cloned().collect(),
        }
    }

    fn subgraph(&self, keep: impl Fn(&EdgeKind) -> bool) -> DiGraph<SchemaId, ()> {
        self.graph
            .filter_map(|_, id| Some(id.clone()), |_, e| keep(e).then_some(()))
    }

    fn cyclic_groups(&self, keep: impl Fn(&EdgeKind) -> bool) -> Vec<Vec<SchemaId>> {
        let sub = self.subgraph(keep);
        let mut groups: Vec<Vec<SchemaId>> = kosaraju_scc(&sub)
            .into_iter()
            .filter(|scc| scc.len() > 1 || sub.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<_> = scc.into_iter().map(|idx| sub[idx].clone()).collect();
                members.sort();
                members
            })
            .collect();
        groups.sort();
        groups
    }
}

/// Graph-level findings for a catalog
#[derive(Debug)]
pub struct GraphAnalysis {
    pub graph: SchemaGraph,
    pub order: Vec<SchemaId>,
    pub diagnostics: Diagnostics,
}

/// Build the graph and report unknown references, inheritance cycles and
/// recursive nesting
pub fn analyze(catalog: &SchemaCatalog) -> GraphAnalysis {
    let mut diagnostics = Diagnostics::new();
    let graph = SchemaGraph::from_catalog(catalog, &mut diagnostics);

    for cycle in graph.inheritance_cycles() {
        diagnostics.inheritance_cycle(&cycle);
    }
    for group in graph.recursive_groups() {
        diagnostics.recursive_nesting(&group);
    }

    let order = graph.synthesis_order();
    GraphAnalysis {
        graph,
        order,
        diagnostics,
    }
}

//! The load graph observed while resolving modules
//!
//! Edges point from an imported module to its importer, so a topological
//! sort lists every module after everything it loads.

use log::debug;
use petgraph::{
    Direction,
    algo::{is_cyclic_directed, toposort},
    graph::{DiGraph, NodeIndex},
};

use crate::{code_generator::Bundler, types::FxIndexMap};

#[derive(Debug, Default)]
pub struct LoadGraph {
    graph: DiGraph<String, ()>,
    nodes: FxIndexMap<String, NodeIndex>,
}

/// An importer whose synthetic function would run before one of its imports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderViolation {
    pub importer: String,
    pub imported: String,
}

impl LoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module node if it is not present yet
    pub fn add_module(&mut self, module_name: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(module_name) {
            return index;
        }
        let index = self.graph.add_node(module_name.to_owned());
        self.nodes.insert(module_name.to_owned(), index);
        index
    }

    /// Record that `importer` loads `imported`
    pub fn add_load(&mut self, importer: &str, imported: &str) {
        let from = self.add_module(imported);
        let to = self.add_module(importer);
        if self.graph.find_edge(from, to).is_none() {
            debug!("Load edge: {importer} -> {imported}");
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn module_count(&self) -> usize {
        self.nodes.len()
    }

    /// Modules loaded by `module_name`, in the order first seen
    pub fn imports_of(&self, module_name: &str) -> Vec<&str> {
        let Some(&index) = self.nodes.get(module_name) else {
            return Vec::new();
        };
        let mut imports: Vec<_> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .map(|node| self.graph[node].as_str())
            .collect();
        // petgraph yields the most recent edge first
        imports.reverse();
        imports
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Modules ordered so that each follows all of its imports
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn dependency_order(&self) -> Option<Vec<&str>> {
        toposort(&self.graph, None).ok().map(|order| {
            order
                .into_iter()
                .map(|node| self.graph[node].as_str())
                .collect()
        })
    }

    /// Check that every import's synthetic function runs before its importer's
    pub fn order_violations(&self, bundler: &Bundler) -> Vec<OrderViolation> {
        self.graph
            .raw_edges()
            .iter()
            .filter_map(|edge| {
                let imported = &self.graph[edge.source()];
                let importer = &self.graph[edge.target()];
                let imported_seq = bundler.sequence_of(imported)?;
                let importer_seq = bundler.sequence_of(importer)?;
                (imported_seq >= importer_seq).then(|| OrderViolation {
                    importer: importer.clone(),
                    imported: imported.clone(),
                })
            })
            .collect()
    }
}

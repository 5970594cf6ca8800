// src/ir/module.rs
use super::entity::EntityTable;
use super::graph::Graph;
use std::sync::Arc;

/// A translation unit: the entity registry plus one graph per function.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: Arc<str>,
    pub entities: EntityTable,
    pub graphs: Vec<Graph>,
}

impl Module {
    /// Creates an empty module with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into(), entities: EntityTable::new(), graphs: Vec::new() }
    }

    /// Adds a graph to the module.
    pub fn add_graph(&mut self, graph: Graph) {
        self.graphs.push(graph);
    }

    /// Finds a graph by name.
    #[must_use]
    pub fn get_graph(&self, name: &str) -> Option<&Graph> {
        self.graphs.iter().find(|g| g.name.as_ref() == name)
    }

    /// Finds a graph by name (mutable reference).
    pub fn get_graph_mut(&mut self, name: &str) -> Option<&mut Graph> {
        self.graphs.iter_mut().find(|g| g.name.as_ref() == name)
    }

    /// Total number of live nodes across all graphs.
    #[must_use]
    pub fn count_live_nodes(&self) -> usize {
        self.graphs.iter().map(|g| g.walk_live().len()).sum()
    }
}

// SPDX-License-Identifier: MIT

//! Graph construction
//!
//! The builder accumulates nodes and edges without validating anything;
//! `compile()` runs every structural check at once so execution can assume a
//! well-formed graph.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::GraphError;
use crate::state::{StateSchema, WorkflowState};

use super::{CompiledGraph, ConditionalEdge, Node, END};

/// Mutable accumulation of a graph definition.
pub struct GraphBuilder {
    schema: StateSchema,
    nodes: HashMap<String, Arc<dyn Node>>,
    duplicates: Vec<String>,
    edges: Vec<(String, String)>,
    conditional: HashMap<String, ConditionalEdge>,
    entry: Option<String>,
}

impl GraphBuilder {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            nodes: HashMap::new(),
            duplicates: Vec::new(),
            edges: Vec::new(),
            conditional: HashMap::new(),
            entry: None,
        }
    }

    /// Register a node under a unique id. Registering the same id twice is
    /// reported by `compile()`.
    pub fn add_node(mut self, id: impl Into<String>, node: Arc<dyn Node>) -> Self {
        let id = id.into();
        if self.nodes.insert(id.clone(), node).is_some() {
            self.duplicates.push(id);
        }
        self
    }

    /// Add an unconditional edge. `to` may be [`END`].
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Attach a conditional edge to `from`. The decision function returns
    /// route keys; `routes` maps each key to a node id or [`END`]. A later
    /// conditional edge for the same source replaces the earlier one.
    pub fn add_conditional_edge(
        mut self,
        from: impl Into<String>,
        decide: impl Fn(&WorkflowState) -> Vec<String> + Send + Sync + 'static,
        routes: HashMap<String, String>,
    ) -> Self {
        self.conditional.insert(
            from.into(),
            ConditionalEdge {
                decide: Arc::new(decide),
                routes,
            },
        );
        self
    }

    /// Designate the start node.
    pub fn set_entry(mut self, id: impl Into<String>) -> Self {
        self.entry = Some(id.into());
        self
    }

    /// Validate and freeze the graph.
    pub fn compile(mut self) -> Result<CompiledGraph, GraphError> {
        if let Some(dup) = self.duplicates.first() {
            return Err(GraphError::DuplicateNode(dup.clone()));
        }

        let entry = self.entry.take().ok_or(GraphError::EntryNotSet)?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::UnknownEntry(entry));
        }

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownEdgeNode {
                    from: from.clone(),
                    to: to.clone(),
                    node: from.clone(),
                });
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(GraphError::UnknownEdgeNode {
                    from: from.clone(),
                    to: to.clone(),
                    node: to.clone(),
                });
            }
            edges.entry(from.clone()).or_default().push(to.clone());
        }

        let mut sources: Vec<&String> = self.conditional.keys().collect();
        sources.sort();
        for from in sources {
            if !self.nodes.contains_key(from.as_str()) {
                return Err(GraphError::UnknownConditionSource(from.clone()));
            }
            let cond = &self.conditional[from.as_str()];
            let mut keys: Vec<&String> = cond.routes.keys().collect();
            keys.sort();
            for key in keys {
                let target = &cond.routes[key];
                if target != END && !self.nodes.contains_key(target) {
                    return Err(GraphError::UnknownRouteTarget {
                        from: from.clone(),
                        key: key.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        log::debug!(
            "compiled graph: {} nodes, {} edges, {} conditional, entry '{}'",
            self.nodes.len(),
            self.edges.len(),
            self.conditional.len(),
            entry
        );

        Ok(CompiledGraph {
            schema: self.schema,
            nodes: self.nodes,
            edges,
            conditional: self.conditional,
            entry,
        })
    }
}

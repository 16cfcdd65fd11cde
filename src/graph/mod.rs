// SPDX-License-Identifier: MIT

//! Graph definition and compilation
//!
//! A workflow is a directed graph of [`Node`]s. Unconditional edges always
//! forward control; conditional edges consult a decision function against
//! live state and translate the returned route keys through a route map.
//! [`GraphBuilder`] accumulates the pieces; [`CompiledGraph`] is the
//! validated, immutable form the engine executes.

mod builder;

pub use builder::GraphBuilder;

use crate::error::WeftError;
use crate::state::{StateSchema, StateUpdate, WorkflowState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Terminal marker. Valid only as an edge or route target; routing a branch
/// here removes it from the frontier.
pub const END: &str = "__end__";

/// A unit of work in the graph.
///
/// Implementations must tolerate concurrent execution: the engine runs every
/// node of a superstep in parallel, each against a state snapshot taken when
/// the superstep began. A node reports its effect as a [`StateUpdate`];
/// returning an error is fatal to the whole run.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, WeftError>;
}

/// Decision function of a conditional edge: inspects state, returns one or
/// more route keys.
pub type DecisionFn = dyn Fn(&WorkflowState) -> Vec<String> + Send + Sync;

/// A data-dependent edge: a decision function plus the map from its route
/// keys to target node ids (or [`END`]).
#[derive(Clone)]
pub struct ConditionalEdge {
    pub(crate) decide: Arc<DecisionFn>,
    pub(crate) routes: HashMap<String, String>,
}

impl ConditionalEdge {
    /// Run the decision function against state.
    pub fn decide(&self, state: &WorkflowState) -> Vec<String> {
        (self.decide)(state)
    }

    /// Target for a route key, if the map names one.
    pub fn target(&self, key: &str) -> Option<&str> {
        self.routes.get(key).map(String::as_str)
    }
}

/// A validated, immutable, executable graph.
pub struct CompiledGraph {
    pub(crate) schema: StateSchema,
    pub(crate) nodes: HashMap<String, Arc<dyn Node>>,
    pub(crate) edges: HashMap<String, Vec<String>>,
    pub(crate) conditional: HashMap<String, ConditionalEdge>,
    pub(crate) entry: String,
}

impl std::fmt::Debug for CompiledGraph {
    // Node values and decision closures are opaque; show ids and topology.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("schema", &self.schema)
            .field("nodes", &self.nodes.keys())
            .field("edges", &self.edges)
            .field("conditional", &self.conditional.keys())
            .field("entry", &self.entry)
            .finish()
    }
}

impl CompiledGraph {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn node(&self, id: &str) -> Option<Arc<dyn Node>> {
        self.nodes.get(id).cloned()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Unconditional edge targets out of a node.
    pub fn edges_from(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The conditional edge out of a node, if one is attached.
    pub fn conditional_from(&self, id: &str) -> Option<&ConditionalEdge> {
        self.conditional.get(id)
    }

    /// Render the topology as Mermaid flowchart text. Unconditional edges are
    /// solid; conditional routes are dashed and labelled with the route key.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart TD\n");
        out.push_str(&format!("    __start__([start]) --> {}\n", self.entry));

        let mut ids: Vec<&String> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            for target in self.edges_from(id) {
                if target == END {
                    out.push_str(&format!("    {id} --> __end__([end])\n"));
                } else {
                    out.push_str(&format!("    {id} --> {target}\n"));
                }
            }
            if let Some(cond) = self.conditional.get(id) {
                let mut keys: Vec<&String> = cond.routes.keys().collect();
                keys.sort();
                for key in keys {
                    let target = &cond.routes[key];
                    if target == END {
                        out.push_str(&format!("    {id} -. {key} .-> __end__([end])\n"));
                    } else {
                        out.push_str(&format!("    {id} -. {key} .-> {target}\n"));
                    }
                }
            }
        }
        out
    }
}

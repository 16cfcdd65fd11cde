// SPDX-License-Identifier: MIT

//! Superstep execution engine
//!
//! The engine drives a [`CompiledGraph`] one superstep at a time: every node
//! in the current frontier runs concurrently against a snapshot of state,
//! the partial updates merge back through the schema's reducers, the next
//! frontier is computed from unconditional and conditional edges, and a
//! checkpoint is written. When the upcoming frontier intersects the
//! interrupt-before set, the engine suspends and hands control back with
//! [`RunResult::AwaitingApproval`]; [`Engine::resume`] picks the thread up
//! from its latest checkpoint, optionally patching state or redirecting the
//! frontier first.

use std::collections::HashSet;
use std::sync::Arc;

use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::error::{EngineError, WeftError};
use crate::graph::{CompiledGraph, END};
use crate::state::{StateUpdate, WorkflowState};

/// Safety ceiling on supersteps per drive. Bounds cyclic graphs (including
/// tool-retry ping-pong) that never route to [`END`].
pub const DEFAULT_MAX_SUPERSTEPS: u32 = 100;

/// How a drive ended.
#[derive(Debug)]
pub enum RunResult {
    /// Every branch routed to [`END`]; the run is complete.
    Terminated { state: WorkflowState },
    /// Execution suspended ahead of interrupt-gated nodes. `pending` is the
    /// frontier that will run when the thread is resumed.
    AwaitingApproval {
        state: WorkflowState,
        pending: Vec<String>,
    },
}

impl RunResult {
    pub fn state(&self) -> &WorkflowState {
        match self {
            RunResult::Terminated { state } => state,
            RunResult::AwaitingApproval { state, .. } => state,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, RunResult::Terminated { .. })
    }

    /// Nodes awaiting approval; empty for a terminated run.
    pub fn pending(&self) -> &[String] {
        match self {
            RunResult::Terminated { .. } => &[],
            RunResult::AwaitingApproval { pending, .. } => pending,
        }
    }
}

/// Adjustments a human can attach to a resume.
#[derive(Clone, Default)]
pub struct ResumeOverride {
    /// Merged into state through the reducers before execution continues.
    pub patch: StateUpdate,
    /// Replace the pending frontier with this node.
    pub goto: Option<String>,
}

impl ResumeOverride {
    /// Patch state and continue with the pending frontier unchanged.
    pub fn patch(patch: StateUpdate) -> Self {
        Self { patch, goto: None }
    }

    /// Patch state and redirect execution to `goto`.
    pub fn redirect(patch: StateUpdate, goto: impl Into<String>) -> Self {
        Self {
            patch,
            goto: Some(goto.into()),
        }
    }
}

/// Drives compiled graphs against a checkpoint store.
pub struct Engine {
    graph: CompiledGraph,
    checkpointer: Arc<dyn Checkpointer>,
    interrupt_before: HashSet<String>,
    max_supersteps: u32,
}

impl Engine {
    pub fn new(graph: CompiledGraph, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            graph,
            checkpointer,
            interrupt_before: HashSet::new(),
            max_supersteps: DEFAULT_MAX_SUPERSTEPS,
        }
    }

    /// Suspend for approval before any of these nodes runs.
    pub fn with_interrupt_before<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for node in nodes {
            let node = node.into();
            if !self.graph.has_node(&node) {
                log::warn!("interrupt gate on unknown node '{node}' will never fire");
            }
            self.interrupt_before.insert(node);
        }
        self
    }

    /// Override the superstep safety ceiling.
    pub fn with_max_supersteps(mut self, limit: u32) -> Self {
        self.max_supersteps = limit;
        self
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Start (or continue) a thread from the entry node.
    ///
    /// An existing thread's state is loaded from its latest checkpoint and
    /// `input` merges into it through the reducers; the frontier resets to
    /// the entry node either way. Continuing a suspended frontier is
    /// [`resume`](Self::resume)'s job, not this one's.
    pub async fn invoke(&self, thread_id: &str, input: StateUpdate) -> Result<RunResult, WeftError> {
        let (mut state, next_seq) = match self.checkpointer.load(thread_id).await? {
            Some(cp) => (
                WorkflowState::from_snapshot(self.graph.schema(), cp.state),
                cp.seq + 1,
            ),
            None => (WorkflowState::new(self.graph.schema()), 0),
        };
        state.apply(input);

        let frontier = vec![self.graph.entry().to_string()];
        self.drive(thread_id, state, frontier, next_seq, false, true)
            .await
    }

    /// Continue a suspended thread from its latest checkpoint.
    ///
    /// `None` approves the pending frontier as-is. With an override, the
    /// patch merges first and `goto` (when set) replaces the frontier. The
    /// first frontier of a resume is exempt from the interrupt gate; later
    /// supersteps re-arm it.
    pub async fn resume(
        &self,
        thread_id: &str,
        override_: Option<ResumeOverride>,
    ) -> Result<RunResult, WeftError> {
        let cp = self
            .checkpointer
            .load(thread_id)
            .await?
            .ok_or_else(|| EngineError::UnknownThread(thread_id.to_string()))?;

        let mut state = WorkflowState::from_snapshot(self.graph.schema(), cp.state);
        let mut frontier = cp.next_nodes;
        let mut persisted = true;

        if let Some(ov) = override_ {
            if !ov.patch.is_empty() {
                state.apply(ov.patch);
                persisted = false;
            }
            if let Some(goto) = ov.goto {
                if !self.graph.has_node(&goto) {
                    return Err(EngineError::UnknownOverrideTarget(goto).into());
                }
                frontier = vec![goto];
                persisted = false;
            }
        }

        self.drive(thread_id, state, frontier, cp.seq + 1, persisted, false)
            .await
    }

    /// The superstep loop.
    ///
    /// `persisted` tracks whether the current (state, frontier) pair already
    /// exists in the store, so suspension never double-writes; `gate_armed`
    /// is false exactly when the upcoming frontier was just approved by a
    /// resume.
    async fn drive(
        &self,
        thread_id: &str,
        mut state: WorkflowState,
        mut frontier: Vec<String>,
        mut next_seq: u64,
        mut persisted: bool,
        mut gate_armed: bool,
    ) -> Result<RunResult, WeftError> {
        let mut steps = 0u32;

        loop {
            if frontier.is_empty() {
                if !persisted {
                    self.save_checkpoint(thread_id, next_seq, &state, &[])
                        .await?;
                }
                log::info!("thread '{thread_id}' terminated after {steps} supersteps");
                return Ok(RunResult::Terminated { state });
            }

            if gate_armed {
                if let Some(gated) = frontier.iter().find(|n| self.interrupt_before.contains(*n)) {
                    log::info!("thread '{thread_id}' awaiting approval before '{gated}'");
                    if !persisted {
                        self.save_checkpoint(thread_id, next_seq, &state, &frontier)
                            .await?;
                    }
                    return Ok(RunResult::AwaitingApproval {
                        state,
                        pending: frontier,
                    });
                }
            }
            gate_armed = true;

            steps += 1;
            if steps > self.max_supersteps {
                log::error!(
                    "thread '{thread_id}' exceeded {} supersteps",
                    self.max_supersteps
                );
                return Err(EngineError::SuperstepLimit {
                    thread: thread_id.to_string(),
                    limit: self.max_supersteps,
                }
                .into());
            }

            log::info!("thread '{thread_id}' superstep {steps}: running {frontier:?}");

            // Every frontier node reads the state as of superstep start.
            let snapshot = Arc::new(state.clone());
            let mut handles = Vec::with_capacity(frontier.len());
            for id in &frontier {
                let node = self.graph.node(id).ok_or_else(|| {
                    EngineError::InvalidState(format!(
                        "checkpoint schedules node '{id}', which the graph does not define"
                    ))
                })?;
                let snap = Arc::clone(&snapshot);
                handles.push((
                    id.clone(),
                    tokio::spawn(async move { node.run(snap.as_ref()).await }),
                ));
            }

            // Barrier: await everything before deciding the superstep's fate.
            let mut updates: Vec<StateUpdate> = Vec::with_capacity(handles.len());
            let mut first_err: Option<WeftError> = None;
            for (id, handle) in handles {
                match handle.await {
                    Ok(Ok(update)) => {
                        log::debug!("node '{id}' completed");
                        updates.push(update);
                    }
                    Ok(Err(e)) => {
                        log::error!("node '{id}' failed: {e}");
                        first_err.get_or_insert(e);
                    }
                    Err(e) => {
                        log::error!("node '{id}' aborted: {e}");
                        first_err.get_or_insert(
                            EngineError::NodePanicked {
                                node: id,
                                message: e.to_string(),
                            }
                            .into(),
                        );
                    }
                }
            }

            // A failed superstep writes no checkpoint; the previous one
            // remains the thread's resume point.
            if let Some(e) = first_err {
                return Err(e);
            }

            for update in updates {
                state.apply(update);
            }

            frontier = self.next_frontier(&frontier, &state)?;
            next_seq = self
                .save_checkpoint(thread_id, next_seq, &state, &frontier)
                .await?;
            persisted = true;
        }
    }

    /// Unconditional edge targets plus conditional route targets for every
    /// completed node, deduplicated, with [`END`] branches dropped.
    fn next_frontier(
        &self,
        completed: &[String],
        state: &WorkflowState,
    ) -> Result<Vec<String>, WeftError> {
        let mut next: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for node_id in completed {
            for target in self.graph.edges_from(node_id) {
                if target != END && seen.insert(target.clone()) {
                    next.push(target.clone());
                }
            }

            if let Some(cond) = self.graph.conditional_from(node_id) {
                let keys = cond.decide(state);
                log::debug!("node '{node_id}' routed to {keys:?}");
                for key in keys {
                    let target = cond.target(&key).ok_or_else(|| EngineError::MissingRoute {
                        node: node_id.clone(),
                        key: key.clone(),
                    })?;
                    if target != END && seen.insert(target.to_string()) {
                        next.push(target.to_string());
                    }
                }
            }
        }

        Ok(next)
    }

    async fn save_checkpoint(
        &self,
        thread_id: &str,
        seq: u64,
        state: &WorkflowState,
        next_nodes: &[String],
    ) -> Result<u64, WeftError> {
        let cp = Checkpoint::new(thread_id, seq, state.snapshot(), next_nodes.to_vec());
        self.checkpointer.save(&cp).await?;
        log::debug!("thread '{thread_id}' checkpoint {seq} saved (pending: {next_nodes:?})");
        Ok(seq + 1)
    }
}

// SPDX-License-Identifier: MIT

//! weft-rs: a workflow orchestration runtime for LLM agents
//!
//! A workflow is a compiled graph of nodes driven in barrier-synchronized
//! supersteps: frontier nodes run concurrently, their partial updates merge
//! into shared state through per-field reducers, and conditional edges route
//! on the merged result. Every completed superstep is checkpointed under an
//! opaque thread id, so runs can suspend at interrupt gates for human
//! approval and resume later, in the same process or after a restart.

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod llm;
pub mod repl;
pub mod state;
pub mod tools;

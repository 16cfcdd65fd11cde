// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - declares the fields of workflow state
//! - `WorkflowState` - runtime state storage with reducer support
//! - `Reducer` - strategies for merging partial updates into state

mod schema;
mod store;

pub use schema::{FieldDef, Reducer, StateSchema};
pub use store::{StateUpdate, WorkflowState};

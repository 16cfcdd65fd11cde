// SPDX-License-Identifier: MIT

//! Interactive approval protocol for gated runs
//!
//! When a run suspends before the tool step, the human sees what the model
//! wants to execute and answers with:
//! - `y` / `yes` to approve and resume unmodified
//! - `n` / `no` / `exit` / `quit` to stop; the checkpoint stays intact and
//!   the thread can be resumed later
//! - anything else, which is never an error: free text becomes a user
//!   message patched into state, redirecting execution back to the
//!   reasoning node
//! - an empty line re-prompts

use std::io::{self, BufRead, Write};

use crate::agent::{conversation, message_update, AGENT_REASON};
use crate::engine::{Engine, ResumeOverride, RunResult};
use crate::error::WeftError;
use crate::llm::{Message, Role};
use crate::state::WorkflowState;

/// A parsed answer to the approval prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Approve,
    Reject,
    /// Free-text instruction to inject instead of running the pending node
    Override(String),
}

/// Classify one line of human input. `None` means re-prompt.
pub fn parse_approval(input: &str) -> Option<Approval> {
    let text = input.trim();
    if text.is_empty() {
        return None;
    }
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Approval::Approve),
        "n" | "no" | "exit" | "quit" => Some(Approval::Reject),
        _ => Some(Approval::Override(text.to_string())),
    }
}

/// Build the resume override for a free-text answer: the text lands as a
/// user message and execution restarts at the reasoning node instead of the
/// pending one.
pub fn override_redirect(text: &str) -> Result<ResumeOverride, WeftError> {
    let patch = message_update(vec![Message::user(text)])?;
    Ok(ResumeOverride::redirect(patch, AGENT_REASON))
}

/// Human-readable description of what a suspended run wants to do.
pub fn describe_pending(result: &RunResult) -> String {
    let mut out = String::new();
    for node in result.pending() {
        out.push_str(&format!("Pending step: {node}\n"));
    }
    if let Ok(history) = conversation(result.state()) {
        if let Some(last) = history.last() {
            for call in &last.tool_calls {
                out.push_str(&format!("  {}({})\n", call.name, call.arguments));
            }
        }
    }
    out
}

/// The final plain-text assistant answer, if the conversation has one.
pub fn last_answer(state: &WorkflowState) -> Option<String> {
    conversation(state)
        .ok()?
        .into_iter()
        .rev()
        .find(|m| m.role == Role::Assistant && !m.has_tool_calls())
        .map(|m| m.content)
}

/// Drive a run through its approval gates against stdin.
///
/// Returns the final [`RunResult`]: terminated, or still suspended when the
/// human rejected (the checkpoint is left intact either way).
pub async fn approval_loop(
    engine: &Engine,
    thread_id: &str,
    mut result: RunResult,
) -> Result<RunResult, WeftError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    while !result.is_terminated() {
        print!(
            "{}Approve? [y/n, or type new instructions] ",
            describe_pending(&result)
        );
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF reads as rejection: leave the thread suspended.
            println!();
            return Ok(result);
        }

        match parse_approval(&line) {
            None => continue,
            Some(Approval::Approve) => {
                log::info!("thread '{thread_id}': approved, resuming");
                result = engine.resume(thread_id, None).await?;
            }
            Some(Approval::Reject) => {
                println!("Rejected. Thread '{thread_id}' stays suspended; run again to resume.");
                return Ok(result);
            }
            Some(Approval::Override(text)) => {
                log::info!("thread '{thread_id}': override, redirecting to {AGENT_REASON}");
                result = engine.resume(thread_id, Some(override_redirect(&text)?)).await?;
            }
        }
    }

    Ok(result)
}

/// Interactive conversation loop: one engine invocation per user line, with
/// approval gates handled inline. `exit`/`quit` or EOF ends the session.
pub async fn chat_loop(engine: &Engine, thread_id: &str) -> Result<(), WeftError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("Chatting on thread '{thread_id}'. Type 'exit' to leave.");
    loop {
        print!("You: ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        let input = message_update(vec![Message::user(text)])?;
        let result = engine.invoke(thread_id, input).await?;
        let result = approval_loop(engine, thread_id, result).await?;

        if result.is_terminated() {
            match last_answer(result.state()) {
                Some(answer) => println!("Agent: {answer}"),
                None => println!("(no answer)"),
            }
        }
    }

    Ok(())
}

//! Transcript refocuser for the doh agent loop.
//!
//! [`refocus`] rewrites an outgoing chat-completions message list into a
//! shorter, semantically equivalent one: the final live tool cycle stays in
//! the conversation, earlier tool cycles collapse into a regenerated system
//! prompt, and prior file-I/O traffic is replaced by a snapshot of the
//! touched files as they currently exist on disk.
//!
//! The transformation is synchronous, stateless across calls, and never
//! fails: disk and log I/O are best-effort, and the structural invariants of
//! the wire protocol (every `tool` message references a live `tool_calls`
//! entry on a preceding assistant message) hold on every emitted list.

pub mod classify;
pub mod collapse;
pub mod deconstruct;
pub mod fsread;
pub mod logging;
pub mod rebuild;
pub mod strategy;
pub mod system;
pub mod truncate;
pub mod vfs;

use std::collections::HashSet;

use serde_json::json;

pub use doh_types::{ChatMessage, FunctionCall, ToolCall};

pub use classify::{classify, FileOpKind, FileOperation, LineRange};
pub use collapse::collapse_assistants;
pub use deconstruct::{deconstruct, DeconstructedTranscript};
pub use strategy::{analyze, Strategy, CONTINUE_PROMPT};
pub use system::compose_system_prompt;
pub use truncate::truncate_search_result;
pub use vfs::{build_vfs, LineMap, VirtualFileSystem};

/// Rewrite an outgoing message list around a regenerated system prompt.
///
/// The output conforms to the same chat-completions schema as the input and
/// is directly submittable. All intermediate state is local to this call.
pub fn refocus(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    tracing::debug!(input_len = messages.len(), "refocus start");
    logging::log_event(
        "refocus: request received",
        &json!({ "messages": messages.len() }),
    );

    let transcript = deconstruct(messages);

    logging::log_event(
        "refocus: consolidating earlier tool activity",
        &json!({
            "keep_last_cycle": transcript.strategy.keep_last_cycle,
            "tracked_files": transcript.vfs.keys().collect::<Vec<_>>(),
            "file_op_call_ids": transcript.file_op_tool_call_ids.iter().collect::<Vec<_>>(),
            "residual_calls": transcript
                .movable_tool_pairs
                .iter()
                .map(|(call, result)| {
                    json!({
                        "id": call.id,
                        "name": call.function.name,
                        "arguments": call.function.arguments,
                        "content": result,
                    })
                })
                .collect::<Vec<_>>(),
        }),
    );

    let system_prompt = compose_system_prompt(
        &transcript.canned_user_context,
        &transcript.vfs,
        &transcript.movable_tool_pairs,
    );

    // The only data channel between deconstruction and splicing: every id in
    // this set has its result represented in the system prompt or the
    // snapshot, so both sides of the pair leave the conversation.
    let mut moved_ids: HashSet<String> = transcript
        .movable_tool_pairs
        .iter()
        .map(|(call, _)| call.id.clone())
        .collect();
    moved_ids.extend(transcript.file_op_tool_call_ids.iter().cloned());

    let spliced = rebuild::rebuild(
        &transcript.real_conversation,
        system_prompt,
        &moved_ids,
        &transcript.strategy,
    );
    let output = collapse_assistants(spliced);

    tracing::debug!(
        input_len = messages.len(),
        output_len = output.len(),
        moved = moved_ids.len(),
        "refocus done"
    );
    logging::log_event("refocus: request rewritten", &json!({ "messages": output.len() }));

    output
}

use std::collections::{HashMap, HashSet};

use doh_types::{ChatMessage, ToolCall};

use crate::classify::classify;
use crate::strategy::{analyze, Strategy};
use crate::vfs::{build_vfs, VirtualFileSystem};

/// An outgoing transcript split into its structural parts.
#[derive(Debug, Default)]
pub struct DeconstructedTranscript {
    pub system_prompt: String,
    pub canned_user_context: String,
    pub canned_assistant_ack: String,
    /// Everything after the canned three-message preamble.
    pub real_conversation: Vec<ChatMessage>,
    /// Completed tool cycles eligible for consolidation, in input order,
    /// file operations already filtered out.
    pub movable_tool_pairs: Vec<(ToolCall, String)>,
    pub vfs: VirtualFileSystem,
    /// Ids of movable pairs that were file operations (their results are
    /// superseded by the snapshot).
    pub file_op_tool_call_ids: HashSet<String>,
    pub strategy: Strategy,
}

/// Split the input list and pair every tool result with its originating
/// call.
///
/// The agent injects a fixed (system, user-environment, assistant-ack)
/// triple at the start of every request; the slice boundary is positional,
/// so a preamble message with an unexpected role degrades to an empty field
/// without shifting the boundary. Inputs shorter than the preamble are
/// passed through whole as the real conversation.
pub fn deconstruct(input: &[ChatMessage]) -> DeconstructedTranscript {
    let (system_prompt, canned_user_context, canned_assistant_ack, real_conversation) =
        if input.len() < 3 {
            (String::new(), String::new(), String::new(), input.to_vec())
        } else {
            let system = match &input[0] {
                ChatMessage::System { content } => content.clone(),
                _ => String::new(),
            };
            let context = match &input[1] {
                ChatMessage::User { content } => content.clone(),
                _ => String::new(),
            };
            let ack = match &input[2] {
                ChatMessage::Assistant { content, .. } => content.clone().unwrap_or_default(),
                _ => String::new(),
            };
            (system, context, ack, input[3..].to_vec())
        };

    let strategy = analyze(&real_conversation);

    // Pair over the whole input, not just the real conversation, so a result
    // never loses its call to the slice boundary.
    let calls_by_id: HashMap<&str, &ToolCall> = input
        .iter()
        .flat_map(|msg| msg.tool_calls().iter())
        .map(|call| (call.id.as_str(), call))
        .collect();

    let mut movable_tool_pairs: Vec<(ToolCall, String)> = Vec::new();
    for msg in input {
        let ChatMessage::Tool {
            content,
            tool_call_id,
        } = msg
        else {
            continue;
        };
        if strategy.keep_last_cycle && strategy.kept_ids.contains(tool_call_id) {
            continue;
        }
        let Some(call) = calls_by_id.get(tool_call_id.as_str()) else {
            tracing::debug!(tool_call_id = %tool_call_id, "tool result without a matching call");
            continue;
        };
        movable_tool_pairs.push(((*call).clone(), content.clone()));
    }

    let vfs = build_vfs(&movable_tool_pairs);

    let file_op_tool_call_ids: HashSet<String> = movable_tool_pairs
        .iter()
        .filter(|(call, _)| classify(call).is_some())
        .map(|(call, _)| call.id.clone())
        .collect();

    // File operations are represented by the snapshot; only the residual
    // pairs are embedded verbatim in the system prompt.
    movable_tool_pairs.retain(|(call, _)| !file_op_tool_call_ids.contains(&call.id));

    DeconstructedTranscript {
        system_prompt,
        canned_user_context,
        canned_assistant_ack,
        real_conversation,
        movable_tool_pairs,
        vfs,
        file_op_tool_call_ids,
        strategy,
    }
}

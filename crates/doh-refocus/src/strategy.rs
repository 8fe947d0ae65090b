use std::collections::HashSet;

use doh_types::ChatMessage;

/// The synthetic user nudge the agent appends when a turn ends on a tool
/// result and the model has to be prodded into continuing.
pub const CONTINUE_PROMPT: &str = "Please continue.";

/// Whether the trailing tool cycle must stay live in the conversation, and
/// which call ids belong to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Strategy {
    pub keep_last_cycle: bool,
    pub kept_ids: HashSet<String>,
}

/// Inspect the tail of the real conversation.
///
/// If the list ends on a tool result (or on a bare continue prompt right
/// after one), the model is mid-reasoning over that cycle and removing its
/// context would break the in-flight thought, so the owning assistant's
/// entire parallel fan-out is kept. Earlier cycles are complete and can be
/// consolidated into the system prompt.
pub fn analyze(real_conversation: &[ChatMessage]) -> Strategy {
    let Some(last) = real_conversation.last() else {
        return Strategy::default();
    };

    match last {
        ChatMessage::Tool { tool_call_id, .. } => keep_cycle(real_conversation, tool_call_id),
        ChatMessage::User { content }
            if content.trim() == CONTINUE_PROMPT && real_conversation.len() >= 2 =>
        {
            match &real_conversation[real_conversation.len() - 2] {
                ChatMessage::Tool { tool_call_id, .. } => {
                    keep_cycle(real_conversation, tool_call_id)
                }
                _ => Strategy::default(),
            }
        }
        _ => Strategy::default(),
    }
}

fn keep_cycle(messages: &[ChatMessage], tool_call_id: &str) -> Strategy {
    let owner = messages
        .iter()
        .find(|msg| msg.tool_calls().iter().any(|call| call.id == tool_call_id));

    let mut kept_ids = HashSet::new();
    match owner {
        Some(assistant) => {
            kept_ids.extend(assistant.tool_calls().iter().map(|call| call.id.clone()));
        }
        None if !tool_call_id.is_empty() => {
            kept_ids.insert(tool_call_id.to_string());
        }
        None => {}
    }

    Strategy {
        keep_last_cycle: true,
        kept_ids,
    }
}

use doh_types::{ChatMessage, ToolCall};

/// Fold every run of consecutive assistant messages into a single message.
///
/// Contents are trimmed, deduplicated on exact match, and joined with
/// newlines in first-occurrence order; tool-call lists are concatenated
/// as-is. A run with neither content nor calls vanishes entirely.
pub fn collapse_assistants(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len());
    let mut iter = messages.into_iter().peekable();

    while let Some(msg) = iter.next() {
        if !matches!(msg, ChatMessage::Assistant { .. }) {
            out.push(msg);
            continue;
        }

        let mut contents: Vec<String> = Vec::new();
        let mut calls: Vec<ToolCall> = Vec::new();
        absorb(&mut contents, &mut calls, msg);
        while matches!(iter.peek(), Some(ChatMessage::Assistant { .. })) {
            let Some(next) = iter.next() else { break };
            absorb(&mut contents, &mut calls, next);
        }

        if contents.is_empty() && calls.is_empty() {
            continue;
        }
        out.push(ChatMessage::Assistant {
            content: if contents.is_empty() {
                None
            } else {
                Some(contents.join("\n"))
            },
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
        });
    }

    out
}

fn absorb(contents: &mut Vec<String>, calls: &mut Vec<ToolCall>, msg: ChatMessage) {
    let ChatMessage::Assistant {
        content,
        tool_calls,
    } = msg
    else {
        return;
    };

    if let Some(text) = content {
        let trimmed = text.trim();
        if !trimmed.is_empty() && !contents.iter().any(|seen| seen == trimmed) {
            contents.push(trimmed.to_string());
        }
    }
    if let Some(mut list) = tool_calls {
        calls.append(&mut list);
    }
}

use std::collections::{HashMap, HashSet};

use doh_types::{ChatMessage, ToolCall};

use crate::strategy::{Strategy, CONTINUE_PROMPT};
use crate::truncate::truncate_search_result;

/// Splice the real conversation into the output list.
///
/// `moved_ids` is the set of tool-call ids whose results now live in the
/// system prompt (residual pairs) or in the file snapshot (file operations);
/// their wire representation is removed here. Tool-link validity holds
/// because a call and its result are always removed together: an assistant's
/// call list is filtered by the same set that filters tool messages.
pub fn rebuild(
    real_conversation: &[ChatMessage],
    system_prompt: String,
    moved_ids: &HashSet<String>,
    strategy: &Strategy,
) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(real_conversation.len() + 1);
    out.push(ChatMessage::system(system_prompt));

    // Owning-call names, for rewriting retained tool results.
    let call_names: HashMap<&str, &str> = real_conversation
        .iter()
        .flat_map(|msg| msg.tool_calls().iter())
        .map(|call| (call.id.as_str(), call.function.name.as_str()))
        .collect();

    let last_index = real_conversation.len().saturating_sub(1);
    for (index, msg) in real_conversation.iter().enumerate() {
        match msg {
            ChatMessage::Tool {
                content,
                tool_call_id,
            } => {
                if moved_ids.contains(tool_call_id) {
                    continue;
                }
                let name = call_names.get(tool_call_id.as_str()).copied().unwrap_or("");
                out.push(ChatMessage::tool(
                    tool_call_id.clone(),
                    truncate_search_result(name, content),
                ));
            }
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let surviving: Vec<ToolCall> = tool_calls
                    .iter()
                    .flatten()
                    .filter(|call| !moved_ids.contains(&call.id))
                    .cloned()
                    .collect();
                if !surviving.is_empty() {
                    out.push(ChatMessage::assistant_with_calls(
                        content.clone(),
                        surviving,
                    ));
                } else if content.as_deref().is_some_and(|text| !text.trim().is_empty()) {
                    out.push(ChatMessage::Assistant {
                        content: content.clone(),
                        tool_calls: None,
                    });
                }
            }
            ChatMessage::User { content } => {
                if content.trim() == CONTINUE_PROMPT {
                    // Stale continue prompts refer to cycles that no longer
                    // exist in the list; only the live tail keeps its nudge.
                    if index == last_index && strategy.keep_last_cycle {
                        out.push(msg.clone());
                    }
                    continue;
                }
                out.push(msg.clone());
            }
            // The composed system message already sits at index 0.
            ChatMessage::System { .. } => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(keep: bool, ids: &[&str]) -> Strategy {
        Strategy {
            keep_last_cycle: keep,
            kept_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    fn moved(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn output_opens_with_the_composed_system_message() {
        let out = rebuild(&[], "prompt".to_string(), &moved(&[]), &strategy(false, &[]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], ChatMessage::system("prompt"));
    }

    #[test]
    fn moved_tool_traffic_is_spliced_out_together() {
        let real = vec![
            ChatMessage::user("question"),
            ChatMessage::assistant_with_calls(
                None,
                vec![ToolCall::function("c1", "run_shell_command", "{}")],
            ),
            ChatMessage::tool("c1", "output"),
            ChatMessage::assistant("answer"),
        ];
        let out = rebuild(&real, "sys".into(), &moved(&["c1"]), &strategy(false, &[]));
        let roles: Vec<&str> = out.iter().map(ChatMessage::role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(out[2].text(), Some("answer"));
    }

    #[test]
    fn assistant_with_surviving_calls_keeps_them() {
        let real = vec![ChatMessage::assistant_with_calls(
            Some("checking".to_string()),
            vec![
                ToolCall::function("gone", "run_shell_command", "{}"),
                ToolCall::function("live", "read_file", "{}"),
            ],
        )];
        let out = rebuild(&real, "sys".into(), &moved(&["gone"]), &strategy(true, &["live"]));
        assert_eq!(out[1].tool_calls().len(), 1);
        assert_eq!(out[1].tool_calls()[0].id, "live");
        assert_eq!(out[1].text(), Some("checking"));
    }

    #[test]
    fn emptied_assistant_with_blank_content_is_dropped() {
        let real = vec![ChatMessage::assistant_with_calls(
            Some("   ".to_string()),
            vec![ToolCall::function("c1", "run_shell_command", "{}")],
        )];
        let out = rebuild(&real, "sys".into(), &moved(&["c1"]), &strategy(false, &[]));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn plain_empty_assistant_is_dropped() {
        let real = vec![ChatMessage::assistant("")];
        let out = rebuild(&real, "sys".into(), &moved(&[]), &strategy(false, &[]));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn retained_search_results_are_rewritten() {
        let hits: Vec<String> = (1..=30).map(|n| format!("L{n}: hit")).collect();
        let result = serde_json::json!({ "output": hits.join("\n") }).to_string();
        let real = vec![
            ChatMessage::assistant_with_calls(
                None,
                vec![ToolCall::function("c1", "search_file_content", "{}")],
            ),
            ChatMessage::tool("c1", result),
        ];
        let out = rebuild(&real, "sys".into(), &moved(&[]), &strategy(true, &["c1"]));
        let rewritten = out[2].text().unwrap();
        assert!(rewritten.contains("truncated 10 more results"));
    }

    #[test]
    fn stale_continue_prompts_are_dropped() {
        let real = vec![
            ChatMessage::user("Please continue."),
            ChatMessage::user("real question"),
            ChatMessage::assistant("sure"),
        ];
        let out = rebuild(&real, "sys".into(), &moved(&[]), &strategy(false, &[]));
        let texts: Vec<Option<&str>> = out.iter().map(ChatMessage::text).collect();
        assert!(!texts.contains(&Some("Please continue.")));
    }

    #[test]
    fn final_continue_prompt_survives_with_a_kept_cycle() {
        let real = vec![
            ChatMessage::assistant_with_calls(
                None,
                vec![ToolCall::function("c1", "run_shell_command", "{}")],
            ),
            ChatMessage::tool("c1", "out"),
            ChatMessage::user("Please continue."),
        ];
        let out = rebuild(&real, "sys".into(), &moved(&[]), &strategy(true, &["c1"]));
        assert_eq!(out.last().unwrap().text(), Some("Please continue."));
    }

    #[test]
    fn final_continue_prompt_is_dropped_without_a_kept_cycle() {
        let real = vec![
            ChatMessage::assistant("done"),
            ChatMessage::user("Please continue."),
        ];
        let out = rebuild(&real, "sys".into(), &moved(&[]), &strategy(false, &[]));
        assert_eq!(out.last().unwrap().text(), Some("done"));
    }

    #[test]
    fn input_system_messages_are_dropped() {
        let real = vec![ChatMessage::system("stray"), ChatMessage::user("hi")];
        let out = rebuild(&real, "sys".into(), &moved(&[]), &strategy(false, &[]));
        let roles: Vec<&str> = out.iter().map(ChatMessage::role).collect();
        assert_eq!(roles, vec!["system", "user"]);
        assert_eq!(out[0].text(), Some("sys"));
    }
}

use std::sync::LazyLock;

use chrono::Local;
use doh_types::ToolCall;
use regex::Regex;
use serde_json::Value;

use crate::truncate::truncate_search_result;
use crate::vfs::{LineMap, VirtualFileSystem};

/// Fixed preamble of every regenerated system prompt.
pub const AGENT_PREAMBLE: &str = r#"You are an interactive CLI agent specializing in software engineering tasks. Your goal is to help users safely and efficiently, adhering strictly to the following conventions:

- Search before you act: locate the relevant code with the search tools before proposing or making changes.
- Read before you write: never modify a file whose current content you have not seen.
- Always refer to files by their absolute paths.
- Keep responses concise and tool-centric; avoid conversational filler.

Earlier tool activity from this session has been consolidated below. File contents reflect the current state on disk, and completed tool calls are summarized so the conversation can stay focused on the task at hand."#;

pub const ENVIRONMENT_HEADER: &str = "# Environment";
pub const FILE_STATES_HEADER: &str = "# Current File States";
pub const TOOL_CALLS_HEADER: &str = "# Previous Tool Calls and Results";
pub const FILE_DIVIDER: &str = "--- END OF FILE ---";
pub const TOOL_CALL_DIVIDER: &str = "--- END OF TOOL CALL ---";
pub const UNTRACKED_PLACEHOLDER: &str = "(file modified but content not tracked)";

static DATE_PROBE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Today's date is ([^.\n]+)").expect("date probe is valid"));
static OS_PROBE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"My operating system is: ([^\n]+)").expect("os probe is valid"));
static CWD_PROBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"I'm currently working in the directory: ([^\n]+)").expect("cwd probe is valid")
});

/// Environment facts recovered from the canned user-context message.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub date: String,
    pub os: String,
    pub cwd: String,
}

/// Probe the canned context for date, OS, and working directory. A foreign
/// or missing preamble degrades field by field: today's date, "unknown",
/// and the process working directory.
pub fn extract_environment(canned_user_context: &str) -> Environment {
    let probe = |re: &Regex| {
        re.captures(canned_user_context)
            .map(|captures| captures[1].trim().to_string())
    };

    Environment {
        date: probe(&DATE_PROBE).unwrap_or_else(|| Local::now().format("%a %b %d %Y").to_string()),
        os: probe(&OS_PROBE).unwrap_or_else(|| "unknown".to_string()),
        cwd: probe(&CWD_PROBE).unwrap_or_else(|| {
            std::env::current_dir()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|_| ".".to_string())
        }),
    }
}

/// Emit the replacement system message: preamble, environment, file
/// snapshots, and the residual (non-file) tool calls, in that fixed order.
pub fn compose_system_prompt(
    canned_user_context: &str,
    vfs: &VirtualFileSystem,
    residual_pairs: &[(ToolCall, String)],
) -> String {
    let env = extract_environment(canned_user_context);

    let mut sections: Vec<String> = Vec::with_capacity(4);
    sections.push(AGENT_PREAMBLE.trim().to_string());
    sections.push(format!(
        "{ENVIRONMENT_HEADER}\n\nToday's date: {}\nOperating system: {}\nWorking directory: {}",
        env.date, env.os, env.cwd
    ));
    if !vfs.is_empty() {
        sections.push(render_file_states(vfs));
    }
    if !residual_pairs.is_empty() {
        sections.push(render_tool_calls(residual_pairs));
    }
    sections.join("\n\n")
}

fn render_file_states(vfs: &VirtualFileSystem) -> String {
    let mut out = String::from(FILE_STATES_HEADER);
    out.push_str(
        "\n\nSnapshots of every file touched so far, as it currently exists on disk.",
    );

    let total = vfs.len();
    for (index, (path, lines)) in vfs.iter().enumerate() {
        out.push_str(&format!("\n\n## {path}\n"));
        if lines.is_empty() {
            out.push_str(&format!("\n{UNTRACKED_PLACEHOLDER}"));
        } else {
            for (start, end, body) in line_runs(lines) {
                let label = if start == end {
                    format!("Line {start}:")
                } else {
                    format!("Lines {start}-{end}:")
                };
                out.push_str(&format!("\n{label}\n```\n{body}\n```"));
            }
        }
        if index + 1 < total {
            out.push_str(&format!("\n\n{FILE_DIVIDER}"));
        }
    }
    out
}

/// Group a sparse line map into maximal consecutive runs, ascending.
fn line_runs(lines: &LineMap) -> Vec<(usize, usize, String)> {
    let mut runs = Vec::new();
    let mut iter = lines.iter();
    let Some((&first, text)) = iter.next() else {
        return runs;
    };

    let mut start = first;
    let mut prev = first;
    let mut body = vec![text.clone()];
    for (&number, text) in iter {
        if number == prev + 1 {
            body.push(text.clone());
        } else {
            runs.push((start, prev, body.join("\n")));
            start = number;
            body = vec![text.clone()];
        }
        prev = number;
    }
    runs.push((start, prev, body.join("\n")));
    runs
}

fn render_tool_calls(pairs: &[(ToolCall, String)]) -> String {
    let mut out = String::from(TOOL_CALLS_HEADER);
    out.push_str("\n\nCompleted tool calls from earlier in this session, kept for reference.");

    let total = pairs.len();
    for (index, (call, result)) in pairs.iter().enumerate() {
        let arguments = pretty_arguments(&call.function.arguments);
        let result = truncate_search_result(&call.function.name, result);
        out.push_str(&format!(
            "\n\n## {}\n\nArguments:\n```json\n{arguments}\n```\n\nResult:\n```\n{result}\n```",
            call.function.name
        ));
        if index + 1 < total {
            out.push_str(&format!("\n\n{TOOL_CALL_DIVIDER}"));
        }
    }
    out
}

fn pretty_arguments(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const CANNED: &str = "Today's date is Mon Jan 05 2026. \
                          \nMy operating system is: linux\
                          \nI'm currently working in the directory: /work/project";

    #[test]
    fn extracts_all_three_environment_fields() {
        let env = extract_environment(CANNED);
        assert_eq!(env.date, "Mon Jan 05 2026");
        assert_eq!(env.os, "linux");
        assert_eq!(env.cwd, "/work/project");
    }

    #[test]
    fn missing_fields_fall_back() {
        let env = extract_environment("nothing recognizable here");
        assert!(!env.date.is_empty());
        assert_eq!(env.os, "unknown");
        assert_eq!(
            env.cwd,
            std::env::current_dir().unwrap().display().to_string()
        );
    }

    #[test]
    fn prompt_always_opens_with_preamble_and_environment() {
        let prompt = compose_system_prompt("", &VirtualFileSystem::new(), &[]);
        assert!(prompt.starts_with(AGENT_PREAMBLE.trim()));
        assert!(prompt.contains(ENVIRONMENT_HEADER));
        assert!(!prompt.contains(FILE_STATES_HEADER));
        assert!(!prompt.contains(TOOL_CALLS_HEADER));
    }

    #[test]
    fn consecutive_lines_group_into_runs() {
        let mut lines = BTreeMap::new();
        for (n, text) in [(1, "a"), (2, "b"), (3, "c"), (7, "g"), (9, "i")] {
            lines.insert(n, text.to_string());
        }
        let runs = line_runs(&lines);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], (1, 3, "a\nb\nc".to_string()));
        assert_eq!(runs[1], (7, 7, "g".to_string()));
        assert_eq!(runs[2], (9, 9, "i".to_string()));
    }

    #[test]
    fn file_states_render_runs_and_dividers() {
        let mut vfs = VirtualFileSystem::new();
        let mut a = BTreeMap::new();
        a.insert(1, "one".to_string());
        a.insert(2, "two".to_string());
        a.insert(5, "five".to_string());
        vfs.insert("/a.txt".to_string(), a);
        vfs.insert("/b.txt".to_string(), BTreeMap::new());

        let prompt = compose_system_prompt(CANNED, &vfs, &[]);
        assert!(prompt.contains("## /a.txt"));
        assert!(prompt.contains("Lines 1-2:\n```\none\ntwo\n```"));
        assert!(prompt.contains("Line 5:\n```\nfive\n```"));
        assert!(prompt.contains(UNTRACKED_PLACEHOLDER));
        // One divider between the two files, none trailing.
        assert_eq!(prompt.matches(FILE_DIVIDER).count(), 1);
        assert!(!prompt.trim_end().ends_with(FILE_DIVIDER));
    }

    #[test]
    fn each_tracked_path_appears_exactly_once_as_heading() {
        let mut vfs = VirtualFileSystem::new();
        vfs.insert("/x.rs".to_string(), BTreeMap::new());
        vfs.insert("/y.rs".to_string(), BTreeMap::new());
        let prompt = compose_system_prompt(CANNED, &vfs, &[]);
        assert_eq!(prompt.matches("## /x.rs").count(), 1);
        assert_eq!(prompt.matches("## /y.rs").count(), 1);
    }

    #[test]
    fn residual_tool_calls_render_pretty_arguments_and_results() {
        let pairs = vec![
            (
                ToolCall::function("c1", "run_shell_command", r#"{"command":"ls -la"}"#),
                "total 8".to_string(),
            ),
            (
                ToolCall::function("c2", "glob", r#"{"pattern":"**/*.rs"}"#),
                "src/main.rs".to_string(),
            ),
        ];
        let prompt = compose_system_prompt(CANNED, &VirtualFileSystem::new(), &pairs);
        assert!(prompt.contains(TOOL_CALLS_HEADER));
        assert!(prompt.contains("## run_shell_command"));
        assert!(prompt.contains("\"command\": \"ls -la\""), "arguments are pretty-printed");
        assert!(prompt.contains("total 8"));
        assert_eq!(prompt.matches(TOOL_CALL_DIVIDER).count(), 1);
    }

    #[test]
    fn unparseable_arguments_fall_back_to_the_raw_string() {
        let pairs = vec![(
            ToolCall::function("c1", "run_shell_command", "{broken"),
            "out".to_string(),
        )];
        let prompt = compose_system_prompt(CANNED, &VirtualFileSystem::new(), &pairs);
        assert!(prompt.contains("{broken"));
    }

    #[test]
    fn search_results_are_truncated_when_embedded() {
        let hits: Vec<String> = (1..=50).map(|n| format!("L{n}: hit")).collect();
        let result = serde_json::json!({ "output": hits.join("\n") }).to_string();
        let pairs = vec![(
            ToolCall::function("c1", "search_file_content", r#"{"pattern":"hit"}"#),
            result,
        )];
        let prompt = compose_system_prompt(CANNED, &VirtualFileSystem::new(), &pairs);
        assert!(prompt.contains("[... truncated 30 more results]"));
        assert!(!prompt.contains("L21: hit"));
    }
}

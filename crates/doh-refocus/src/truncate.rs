use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Tool whose results are bounded before being embedded in a prompt.
pub const SEARCH_TOOL: &str = "search_file_content";

const MAX_HIT_LINES: usize = 20;
const MAX_HIT_CHARS: usize = 1000;

static HIT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^L\d+:\s?").expect("hit-line pattern is valid"));

/// Bound a grep-style result so it cannot dominate the system prompt.
///
/// Acts only on `search_file_content` results that decode to a JSON object
/// with a string `output` field; anything else passes through unchanged.
/// The output keeps at most the first 20 hit lines (`L<n>: ...`); once the
/// cap is reached a single `[... truncated N more results]` line replaces
/// the rest. Header and separator lines interleaved before the cutoff
/// survive, and any retained hit whose content exceeds 1000 characters is
/// shortened with an ellipsis.
pub fn truncate_search_result(function_name: &str, result: &str) -> String {
    if function_name != SEARCH_TOOL {
        return result.to_string();
    }
    let Ok(mut decoded) = serde_json::from_str::<Value>(result) else {
        return result.to_string();
    };
    let Some(output) = decoded.get("output").and_then(Value::as_str) else {
        return result.to_string();
    };
    let output = output.to_string();

    let total_hits = output.lines().filter(|line| HIT_PREFIX.is_match(line)).count();

    let mut kept: Vec<String> = Vec::new();
    let mut hits = 0usize;
    for line in output.lines() {
        match HIT_PREFIX.find(line) {
            Some(prefix) => {
                hits += 1;
                kept.push(cap_hit_line(line, prefix.end()));
                if hits == MAX_HIT_LINES && total_hits > MAX_HIT_LINES {
                    kept.push(format!(
                        "[... truncated {} more results]",
                        total_hits - MAX_HIT_LINES
                    ));
                    break;
                }
            }
            None => kept.push(line.to_string()),
        }
    }

    if let Some(obj) = decoded.as_object_mut() {
        obj.insert("output".to_string(), Value::String(kept.join("\n")));
    }
    serde_json::to_string(&decoded).unwrap_or_else(|_| result.to_string())
}

fn cap_hit_line(line: &str, prefix_end: usize) -> String {
    let (prefix, content) = line.split_at(prefix_end);
    if content.chars().count() <= MAX_HIT_CHARS {
        return line.to_string();
    }
    let capped: String = content.chars().take(MAX_HIT_CHARS).collect();
    format!("{prefix}{capped}...")
}

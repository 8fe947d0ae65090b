use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

/// Session log location, relative to the process working directory.
pub const LOG_RELATIVE_PATH: &str = ".doh/logs/qwen.log";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("log io: {0}")]
    Io(#[from] std::io::Error),
    #[error("log serialize: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append a timestamped entry to the session log.
///
/// Best-effort: a failure is reported on stderr and never reaches the
/// caller. The transformation result does not depend on the log.
pub fn log_event(message: &str, data: &Value) {
    let path = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(LOG_RELATIVE_PATH);
    if let Err(err) = append_entry(&path, message, data) {
        eprintln!("doh: failed to write session log: {err}");
    }
}

fn append_entry(path: &Path, message: &str, data: &Value) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut expanded = data.clone();
    expand_encoded_strings(&mut expanded);
    let pretty = serde_json::to_string_pretty(&expanded)?;
    let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write!(file, "[{stamp}] {message}\n{pretty}\n\n")?;
    Ok(())
}

/// Replace JSON-encoded string values found under `arguments` or `content`
/// keys with their parsed form, so the log stays readable instead of
/// accumulating nested escaping. Strings that parse to scalars are left
/// alone.
fn expand_encoded_strings(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if matches!(key.as_str(), "arguments" | "content") {
                    if let Value::String(raw) = entry {
                        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
                            if parsed.is_object() || parsed.is_array() {
                                *entry = parsed;
                                continue;
                            }
                        }
                    }
                }
                expand_encoded_strings(entry);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                expand_encoded_strings(item);
            }
        }
        _ => {}
    }
}

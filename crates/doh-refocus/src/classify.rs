use doh_types::ToolCall;
use serde_json::Value;

/// What a file-operation tool call does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpKind {
    Read,
    Write,
    Edit,
}

/// An optional line window on a read operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineRange {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// A tool call recognized as touching a file on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOperation {
    pub kind: FileOpKind,
    pub path: String,
    /// Present for read operations only.
    pub range: Option<LineRange>,
    pub tool_call_id: String,
}

/// Decide whether a tool call is a file operation and extract its shape.
///
/// Pure: decodes `function.arguments` and nothing else. A malformed
/// arguments blob classifies as "not a file operation" so the pair flows to
/// the residual tool-call section untouched.
pub fn classify(call: &ToolCall) -> Option<FileOperation> {
    let args: Value = serde_json::from_str(&call.function.arguments).ok()?;

    match call.function.name.as_str() {
        "read_file" | "read_many_files" => {
            let path = if let Some(path) = args.get("absolute_path").and_then(Value::as_str) {
                path.to_string()
            } else {
                // read_many_files tracks only the first requested path.
                args.get("absolute_paths")?
                    .as_array()?
                    .first()?
                    .as_str()?
                    .to_string()
            };
            Some(FileOperation {
                kind: FileOpKind::Read,
                path,
                range: Some(LineRange {
                    offset: args.get("offset").and_then(Value::as_u64),
                    limit: args.get("limit").and_then(Value::as_u64),
                }),
                tool_call_id: call.id.clone(),
            })
        }
        "write_file" => {
            let path = args.get("file_path").and_then(Value::as_str)?;
            args.get("content")?;
            Some(FileOperation {
                kind: FileOpKind::Write,
                path: path.to_string(),
                range: None,
                tool_call_id: call.id.clone(),
            })
        }
        "replace" => {
            let path = args.get("file_path").and_then(Value::as_str)?;
            Some(FileOperation {
                kind: FileOpKind::Edit,
                path: path.to_string(),
                range: None,
                tool_call_id: call.id.clone(),
            })
        }
        _ => None,
    }
}

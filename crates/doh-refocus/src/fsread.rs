use std::collections::BTreeMap;
use std::fs;

/// Read a line range from a file on disk, keyed by 1-indexed line number.
///
/// `offset` is the number of leading lines to skip (0, the default, starts
/// at line 1); `limit` bounds how many lines are returned, `None` meaning to
/// end of file. Splitting follows `str::lines`, so a terminal newline does
/// not produce a trailing empty entry.
///
/// Best-effort by design: a missing file, a permission error, or invalid
/// UTF-8 all yield an empty map. The snapshot layer treats every failure the
/// same way and renders a placeholder instead.
pub fn read_range(path: &str, offset: Option<u64>, limit: Option<u64>) -> BTreeMap<usize, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::debug!(path, error = %err, "file snapshot read failed");
            return BTreeMap::new();
        }
    };

    let start = offset.unwrap_or(0) as usize;
    let mut lines = BTreeMap::new();
    for (idx, line) in content.lines().enumerate().skip(start) {
        if let Some(limit) = limit {
            if lines.len() as u64 >= limit {
                break;
            }
        }
        lines.insert(idx + 1, line.to_string());
    }
    lines
}

use std::collections::BTreeMap;

use doh_types::ToolCall;

use crate::classify::{classify, FileOpKind};
use crate::fsread::read_range;

/// Line-number → line text, 1-indexed and sparse.
pub type LineMap = BTreeMap<usize, String>;

/// Path → tracked lines for every file the assistant has touched.
///
/// Paths are kept as the opaque text the tool call carried; no normalization
/// is applied, so two spellings of one file are two entries.
pub type VirtualFileSystem = BTreeMap<String, LineMap>;

/// Build the snapshot for the given tool-call/result pairs.
///
/// Contents come from the disk as it is *now*, never from the recorded tool
/// results, so later writes are already reflected and stale reads resolve
/// themselves. Pairs are processed in conversation order:
///
/// - a ranged read merges its window into the existing entry (fresh lines
///   win on collision),
/// - a write or edit re-reads the whole file and replaces the entry.
///
/// A path whose read fails still gains a key; the prompt composer renders a
/// placeholder for it.
pub fn build_vfs(pairs: &[(ToolCall, String)]) -> VirtualFileSystem {
    let mut vfs = VirtualFileSystem::new();

    for (call, _result) in pairs {
        let Some(op) = classify(call) else { continue };
        match op.kind {
            FileOpKind::Read => {
                let range = op.range.unwrap_or_default();
                let fresh = read_range(&op.path, range.offset, range.limit);
                vfs.entry(op.path).or_default().extend(fresh);
            }
            FileOpKind::Write | FileOpKind::Edit => {
                let fresh = read_range(&op.path, None, None);
                vfs.insert(op.path, fresh);
            }
        }
    }

    vfs
}

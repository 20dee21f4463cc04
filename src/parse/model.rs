//! The typed records produced by the version-control output parser.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

/// The closed set of per-path change kinds. `None` represents a context line
/// within a diff — it has no meaning as a file-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Deleted,
    Modified,
    Renamed,
    Untracked,
    None,
}

/// One line of `status --porcelain` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub path: String,
    pub change_type: ChangeType,
}

/// One line of a unified diff body, tagged with whether it's an addition, a
/// deletion, or context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiff {
    pub change_type: ChangeType,
    pub line: String,
}

/// The diff for a single file within a commit or a working-tree diff.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDiff {
    pub file_name: String,
    pub binary: bool,
    pub lines: Vec<LineDiff>,
}

/// A single commit's identity and metadata, independent of its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub timestamp: DateTime<FixedOffset>,
}

/// Per-file summary inside a [`ChangeSetDetail`]. `binary` is sticky: once a
/// merge of inputs sets it, nothing in the same change-set clears it again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileInfo {
    pub insertions: u32,
    pub deletions: u32,
    pub binary: bool,
    pub change_type: ChangeType,
    pub lines: Vec<LineDiff>,
}

impl FileInfo {
    fn mark_binary(&mut self) {
        self.binary = true;
    }
}

/// A commit (or working-tree diff, when `change_set` is `None`) plus its
/// per-file summary and accumulated diff lines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeSetDetail {
    pub change_set: Option<ChangeSet>,
    pub files: BTreeMap<String, FileInfo>,
    pub files_changed: u32,
    pub total_insertions: u32,
    pub total_deletions: u32,
}

impl ChangeSetDetail {
    pub fn new(change_set: Option<ChangeSet>) -> Self {
        ChangeSetDetail {
            change_set,
            ..Default::default()
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Merges one emitted [`FileDiff`] into this detail, per the aggregation
    /// invariant: binary is OR'd and made sticky, lines are appended in
    /// order, and a previously-unseen path gets a fresh [`FileInfo`].
    ///
    /// Returns the same diff with `binary` updated to the merged value, so
    /// the object the caller holds stays consistent with what landed in the
    /// detail's file map.
    pub fn merge_file_diff(&mut self, mut diff: FileDiff) -> FileDiff {
        let entry = self.files.entry(diff.file_name.clone()).or_default();
        if diff.binary {
            entry.mark_binary();
        }
        if entry.binary {
            diff.binary = true;
        }
        entry.lines.extend(diff.lines.iter().cloned());
        diff
    }
}

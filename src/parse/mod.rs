//! The version-control output parser: a textual stream reader (`reader`,
//! re-exported from the crate root), small recognizers (`helpers`), the typed
//! model (`model`), and the parser itself (`vcs`).

pub mod helpers;
pub mod model;
pub mod vcs;

pub use model::{ChangeSet, ChangeSetDetail, ChangeType, FileDiff, FileInfo, FileStatus, LineDiff};
pub use vcs::{parse_commit, parse_log, parse_show, parse_status, parse_working_diff, populate_name_status};

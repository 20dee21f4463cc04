//! Small stateless recognizers reused by the commit-block, show, and diff
//! parsers in [`crate::parse::vcs`]. Kept separate from the main parser
//! because each is independently testable against the exact line shapes the
//! version-control tool emits.

use lazy_static::lazy_static;
use regex::Regex;

use super::model::ChangeSetDetail;

/// True iff `line` consists solely of a single line feed, optionally preceded
/// by a carriage return. Used as the section terminator inside commit blocks
/// and `--shortstat` summaries.
pub fn is_single_line_feed(line: &str) -> bool {
    line == "\n" || line == "\r\n"
}

/// True iff `line` begins with `commit ` — the marker used both at the top
/// of a log/show block and, mid-diff, to detect a nested merge-parent block.
pub fn is_commit_header(line: &str) -> bool {
    line.starts_with("commit ")
}

lazy_static! {
    // " 3 files changed, 10 insertions(+), 4 deletions(-)"
    // Either trailing clause may be absent.
    static ref SUMMARY_FOOTER_RE: Regex = Regex::new(
        r"(?x)
        ^\s*(?P<files>\d+)\ files?\ changed
        (,\ (?P<insertions>\d+)\ insertions?\(\+\))?
        (,\ (?P<deletions>\d+)\ deletions?\(-\))?
        "
    ).unwrap();
}

/// Recognizes a `--shortstat` footer line (`N files changed, ...`) and, if it
/// matches, records the totals on `detail`. Lines that don't match are left
/// untouched — this is a tolerant recognizer, not a parser that errors on
/// anything unexpected.
pub fn parse_summary_footer(line: &str, detail: &mut ChangeSetDetail) -> bool {
    let caps = match SUMMARY_FOOTER_RE.captures(line.trim_end()) {
        Some(c) => c,
        None => return false,
    };
    detail.files_changed = caps
        .name("files")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    detail.total_insertions = caps
        .name("insertions")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    detail.total_deletions = caps
        .name("deletions")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_feed_variants() {
        assert!(is_single_line_feed("\n"));
        assert!(is_single_line_feed("\r\n"));
        assert!(!is_single_line_feed(""));
        assert!(!is_single_line_feed("x\n"));
    }

    #[test]
    fn commit_header_detection() {
        assert!(is_commit_header("commit abc123\n"));
        assert!(!is_commit_header("Author: x\n"));
    }

    #[test]
    fn footer_with_both_clauses() {
        let mut detail = ChangeSetDetail::default();
        assert!(parse_summary_footer(
            " 3 files changed, 10 insertions(+), 4 deletions(-)\n",
            &mut detail
        ));
        assert_eq!(detail.files_changed, 3);
        assert_eq!(detail.total_insertions, 10);
        assert_eq!(detail.total_deletions, 4);
    }

    #[test]
    fn footer_with_only_insertions() {
        let mut detail = ChangeSetDetail::default();
        assert!(parse_summary_footer(
            " 1 file changed, 1 insertion(+)\n",
            &mut detail
        ));
        assert_eq!(detail.files_changed, 1);
        assert_eq!(detail.total_insertions, 1);
        assert_eq!(detail.total_deletions, 0);
    }

    #[test]
    fn non_footer_line_is_rejected() {
        let mut detail = ChangeSetDetail::default();
        assert!(!parse_summary_footer("diff --git a/x b/x\n", &mut detail));
    }
}

//! Turns `status --porcelain`, `log`, `show --numstat --shortstat`, and
//! `diff` text into the typed records in [`super::model`].

use chrono::{DateTime, FixedOffset};

use crate::errors::{Error, Result};
use crate::reader::Reader;

use super::helpers::{is_commit_header, is_single_line_feed, parse_summary_footer};
use super::model::{ChangeSet, ChangeSetDetail, ChangeType, FileDiff, FileStatus, LineDiff};

const COMMIT_DATE_FORMAT: &str = "%a %b %e %H:%M:%S %Y %z";

fn status_code_to_change_type(code: &str) -> Result<ChangeType> {
    match code {
        "A" | "AM" => Ok(ChangeType::Added),
        "M" | "MM" => Ok(ChangeType::Modified),
        "D" => Ok(ChangeType::Deleted),
        "R" => Ok(ChangeType::Renamed),
        "??" => Ok(ChangeType::Untracked),
        other => Err(Error::UnsupportedStatus {
            code: other.to_string(),
            line: other.to_string(),
        }),
    }
}

pub struct StatusIter<'a> {
    reader: Reader<'a>,
}

impl<'a> Iterator for StatusIter<'a> {
    type Item = Result<FileStatus>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.reader.done() {
                return None;
            }
            let raw = self.reader.read_line();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parts = trimmed.splitn(2, char::is_whitespace);
            let code = parts.next().unwrap_or("");
            let path = parts.next().unwrap_or("").trim().to_string();
            let change_type = match status_code_to_change_type(code) {
                Ok(ct) => ct,
                Err(_) => {
                    return Some(Err(Error::UnsupportedStatus {
                        code: code.to_string(),
                        line: trimmed.to_string(),
                    }))
                }
            };
            return Some(Ok(FileStatus { path, change_type }));
        }
    }
}

/// Parses `status --porcelain` output into a lazy sequence of [`FileStatus`].
pub fn parse_status(text: &str) -> StatusIter<'_> {
    StatusIter {
        reader: Reader::new(text),
    }
}

fn blank_terminator(line: &str) -> bool {
    line.is_empty() || is_single_line_feed(line)
}

fn parse_commit_header_line(reader: &mut Reader) -> Result<String> {
    let line = reader.read_line();
    if !is_commit_header(line) {
        return Err(Error::parse(
            "commit header",
            format!("expected a line starting with 'commit ', got '{line}'"),
        ));
    }
    let rest = line.trim_end_matches(['\n', '\r']);
    let hash = rest
        .strip_prefix("commit ")
        .unwrap_or("")
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string();
    Ok(hash)
}

fn parse_author(value: &str) -> (String, String) {
    match value.find('<') {
        Some(lt) => {
            let name = value[..lt].trim().to_string();
            let after = &value[lt + 1..];
            let email = after.split('>').next().unwrap_or("").trim().to_string();
            (name, email)
        }
        None => (value.trim().to_string(), String::new()),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value.trim(), COMMIT_DATE_FORMAT)
        .map_err(|e| Error::parse("commit date", format!("'{value}': {e}")))
}

/// Parses one `commit <hash>` block: headers up to a blank line, then message
/// lines up to the next blank line. Also used recursively for a nested commit
/// header encountered mid-diff in a merge.
pub fn parse_commit(reader: &mut Reader) -> Result<ChangeSet> {
    let id = parse_commit_header_line(reader)?;
    let mut author_name = String::new();
    let mut author_email = String::new();
    let mut timestamp = None;

    loop {
        if reader.done() {
            break;
        }
        let line = reader.read_line();
        if blank_terminator(line) {
            break;
        }
        if let Some(idx) = line.find(':') {
            let key = line[..idx].trim();
            let value = line[idx + 1..].trim_end_matches(['\n', '\r']).trim();
            match key {
                "Author" => {
                    let (name, email) = parse_author(value);
                    author_name = name;
                    author_email = email;
                }
                "Date" => {
                    timestamp = Some(parse_timestamp(value)?);
                }
                _ => {}
            }
        }
    }

    // Message lines are concatenated without separators: this is historical
    // behavior preserved for round-trip, not an oversight.
    let mut message = String::new();
    loop {
        if reader.done() {
            break;
        }
        let line = reader.read_line();
        if blank_terminator(line) {
            break;
        }
        message.push_str(line.trim_end_matches(['\n', '\r']));
    }

    let timestamp = timestamp.ok_or_else(|| {
        Error::parse("commit date", format!("commit {id} has no Date header"))
    })?;

    Ok(ChangeSet {
        id,
        author_name,
        author_email,
        message,
        timestamp,
    })
}

pub struct LogIter<'a> {
    reader: Reader<'a>,
}

impl<'a> Iterator for LogIter<'a> {
    type Item = Result<ChangeSet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.done() {
            return None;
        }
        Some(parse_commit(&mut self.reader))
    }
}

/// Parses `log --all` output into a lazy sequence of [`ChangeSet`]s.
pub fn parse_log(text: &str) -> LogIter<'_> {
    LogIter {
        reader: Reader::new(text),
    }
}

fn apply_numstat_row(detail: &mut ChangeSetDetail, insertions: &str, deletions: &str, path: &str) {
    let entry = detail.files.entry(path.to_string()).or_default();
    if insertions == "-" || deletions == "-" {
        entry.binary = true;
    } else {
        entry.insertions = insertions.parse().unwrap_or(0);
        entry.deletions = deletions.parse().unwrap_or(0);
    }
}

fn parse_summary_section(reader: &mut Reader, detail: &mut ChangeSetDetail) -> Result<()> {
    loop {
        if reader.done() {
            break;
        }
        let line = reader.read_line();
        if blank_terminator(line) {
            break;
        }
        let body = line.trim_end_matches(['\n', '\r']);
        if body.contains('\t') {
            let mut parts = body.split('\t');
            let insertions = parts.next().unwrap_or("").trim();
            let deletions = parts.next().unwrap_or("").trim();
            let path = parts.next().unwrap_or("").trim();
            apply_numstat_row(detail, insertions, deletions, path);
        } else {
            parse_summary_footer(line, detail);
        }
    }
    Ok(())
}

/// Parses one `diff --git a/<path> b/<path>` chunk. Returns `None` for a
/// path that already has accumulated lines in `detail` — the merge-commit
/// case where a later parent's diff for the same path is discarded.
fn parse_file_diff_chunk(chunk_text: &str, detail: &mut ChangeSetDetail) -> Result<Option<FileDiff>> {
    let mut reader = Reader::new(chunk_text);
    let header = reader.read_line();
    let header_body = header.trim_end_matches(['\n', '\r']);
    let file_name = header_body
        .strip_prefix("diff --git a/")
        .and_then(|rest| rest.split(' ').next())
        .unwrap_or("")
        .to_string();

    // The numstat summary already gave every path a FileInfo, so presence
    // alone can't signal a duplicate; non-empty lines can only mean this
    // path's diff was already attached once, by an earlier parent.
    let already_diffed = detail
        .files
        .get(&file_name)
        .map(|info| !info.lines.is_empty())
        .unwrap_or(false);
    if already_diffed {
        return Ok(None);
    }

    let mut diff = FileDiff {
        file_name,
        binary: false,
        lines: Vec::new(),
    };

    // Preamble (index/---/+++/mode lines) is consumed silently.
    loop {
        if reader.done() {
            return Ok(Some(diff));
        }
        let line = reader.read_line();
        if line.starts_with("@@") {
            reader.put_back_line(line);
            break;
        }
        if line.starts_with("GIT binary patch") {
            diff.binary = true;
            reader.read_to_end();
            return Ok(Some(diff));
        }
        if line.is_empty() {
            return Ok(Some(diff));
        }
    }

    loop {
        if reader.done() {
            break;
        }
        let line = reader.read_line();
        if line.is_empty() {
            break;
        }
        if is_commit_header(line) {
            reader.put_back_line(line);
            let nested = parse_commit(&mut reader)?;
            parse_summary_section(&mut reader, detail)?;
            if detail.change_set.is_none() {
                detail.change_set = Some(nested);
            }
            continue;
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
        if line.starts_with('+') {
            diff.lines.push(LineDiff {
                change_type: ChangeType::Added,
                line: trimmed,
            });
        } else if line.starts_with('-') {
            diff.lines.push(LineDiff {
                change_type: ChangeType::Deleted,
                line: trimmed,
            });
        } else {
            diff.lines.push(LineDiff {
                change_type: ChangeType::None,
                line: trimmed,
            });
        }
    }

    Ok(Some(diff))
}

fn parse_diff_section(reader: &mut Reader, detail: &mut ChangeSetDetail) -> Result<()> {
    let mut buffer = String::new();
    let flush = |buffer: &mut String, detail: &mut ChangeSetDetail| -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(buffer);
        if let Some(diff) = parse_file_diff_chunk(&chunk, detail)? {
            detail.merge_file_diff(diff);
        }
        Ok(())
    };

    loop {
        if reader.done() {
            flush(&mut buffer, detail)?;
            break;
        }
        let line = reader.read_line();
        if line.starts_with("diff --git") && !buffer.is_empty() {
            flush(&mut buffer, detail)?;
        }
        buffer.push_str(line);
    }
    Ok(())
}

fn change_type_from_name_status(code: &str) -> Option<ChangeType> {
    match code.chars().next()? {
        'A' => Some(ChangeType::Added),
        'M' => Some(ChangeType::Modified),
        'D' => Some(ChangeType::Deleted),
        'R' => Some(ChangeType::Renamed),
        _ => None,
    }
}

/// Updates per-file change types from `--name-status` output; paths not
/// already present are ignored.
pub fn populate_name_status(text: &str, detail: &mut ChangeSetDetail) {
    for line in text.lines() {
        let Some(tab) = line.find('\t') else {
            continue;
        };
        let status = line[..tab].trim();
        let path = line[tab + 1..].trim();
        if let Some(change_type) = change_type_from_name_status(status) {
            if let Some(info) = detail.files.get_mut(path) {
                info.change_type = change_type;
            }
        }
    }
}

/// Parses `show <id> -m -p --numstat --shortstat` into a [`ChangeSetDetail`].
pub fn parse_show(text: &str, include_change_set: bool) -> Result<ChangeSetDetail> {
    let mut reader = Reader::new(text);
    let change_set = if include_change_set {
        Some(parse_commit(&mut reader)?)
    } else {
        None
    };
    let mut detail = ChangeSetDetail::new(change_set);
    parse_summary_section(&mut reader, &mut detail)?;
    parse_diff_section(&mut reader, &mut detail)?;
    Ok(detail)
}

/// Composes a working-tree [`ChangeSetDetail`] (no [`ChangeSet`]) from the
/// driver's two staged-diff invocations.
pub fn parse_working_diff(numstat_and_patch: &str, name_status: &str) -> Result<ChangeSetDetail> {
    let mut reader = Reader::new(numstat_and_patch);
    let mut detail = ChangeSetDetail::new(None);
    parse_summary_section(&mut reader, &mut detail)?;
    parse_diff_section(&mut reader, &mut detail)?;
    populate_name_status(name_status, &mut detail);
    Ok(detail)
}

//! Unified-diff parsing and patch-id computation.
//!
//! The repository facade hands this module raw diff text (produced by the
//! object-store differ); everything here is pure text processing, so it has
//! no `git2` dependency of its own beyond the [`crate::model::ObjectHash`]
//! newtype.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use sha1::{Digest, Sha1};

use crate::error::Result;
use crate::model::{ChangeKind, FileChange, Hunk, ObjectHash};
use crate::repo::CommitRange;

/// Parse the unified-diff text for an entire tree-to-tree diff (possibly
/// covering many files) into [`FileChange`] records.
///
/// Grammar per file section:
///
/// ```text
/// DIFF_HEADER := "diff --git a/<old> b/<new>"
///                ["new file" | "deleted file" | "rename from" ...]
///                ["index <old_hex>..<new_hex>" ...]
/// HUNK        := "@@ -old_start[,old_count] +new_start[,new_count] @@ [header]"
///                (content_line)*
/// CONTENT     := "+" text | "-" text | " " text | "\" text_comment
/// ```
pub fn parse_unified_diff(text: &str) -> Vec<FileChange> {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections: Vec<Vec<&str>> = Vec::new();
    for line in lines {
        if line.starts_with("diff --git ") {
            sections.push(vec![line]);
        } else if let Some(section) = sections.last_mut() {
            section.push(line);
        }
    }
    sections
        .into_iter()
        .filter_map(|section| parse_single_file_diff(&section))
        .collect()
}

fn parse_single_file_diff(section: &[&str]) -> Option<FileChange> {
    let header = section.first()?;
    let (old_path, new_path) = parse_diff_git_line(header)?;

    let mut kind = ChangeKind::Modify;
    let mut old_blob = None;
    let mut new_blob = None;
    let mut old_mode = None;
    let mut new_mode = None;
    let mut rename_from: Option<PathBuf> = None;
    let mut is_rename = false;
    let mut hunk_start = section.len();

    for (i, line) in section.iter().enumerate().skip(1) {
        if line.starts_with("@@ ") || *line == "@@" {
            hunk_start = i;
            break;
        }
        if let Some(rest) = line.strip_prefix("new file mode ") {
            kind = ChangeKind::Add;
            new_mode = u32::from_str_radix(rest.trim(), 8).ok();
        } else if let Some(rest) = line.strip_prefix("deleted file mode ") {
            kind = ChangeKind::Delete;
            old_mode = u32::from_str_radix(rest.trim(), 8).ok();
        } else if let Some(rest) = line.strip_prefix("rename from ") {
            is_rename = true;
            rename_from = Some(PathBuf::from(rest));
        } else if line.starts_with("rename to ") {
            is_rename = true;
        } else if line.starts_with("copy from ") {
            kind = ChangeKind::Copy;
        } else if let Some(rest) = line.strip_prefix("old mode ") {
            old_mode = u32::from_str_radix(rest.trim(), 8).ok();
        } else if let Some(rest) = line.strip_prefix("new mode ") {
            new_mode = u32::from_str_radix(rest.trim(), 8).ok();
        } else if let Some(rest) = line.strip_prefix("index ") {
            let (hashes, mode) = match rest.split_once(' ') {
                Some((h, m)) => (h, Some(m)),
                None => (rest, None),
            };
            if let Some((old_hex, new_hex)) = hashes.split_once("..") {
                old_blob = ObjectHash::from_str(old_hex).ok();
                new_blob = ObjectHash::from_str(new_hex).ok();
            }
            if let Some(mode) = mode {
                let parsed = u32::from_str_radix(mode.trim(), 8).ok();
                old_mode = old_mode.or(parsed);
                new_mode = new_mode.or(parsed);
            }
        }
    }
    if is_rename {
        kind = ChangeKind::Rename;
    }

    let hunks = parse_hunks(&section[hunk_start..]);
    let (additions, deletions) = tally(&hunks);

    Some(FileChange {
        path: new_path,
        kind,
        old_path: if matches!(kind, ChangeKind::Rename | ChangeKind::Copy) {
            rename_from.or(Some(old_path))
        } else {
            None
        },
        old_mode,
        new_mode,
        old_blob,
        new_blob,
        additions,
        deletions,
        hunks,
    })
}

/// Parse `diff --git a/<old> b/<new>` into `(old_path, new_path)`.
fn parse_diff_git_line(line: &str) -> Option<(PathBuf, PathBuf)> {
    let rest = line.strip_prefix("diff --git ")?;
    let a_idx = rest.find("a/")?;
    let after_a = &rest[a_idx + 2..];
    let b_marker = " b/";
    let b_idx = after_a.rfind(b_marker)?;
    let old = &after_a[..b_idx];
    let new = &after_a[b_idx + b_marker.len()..];
    Some((PathBuf::from(old), PathBuf::from(new)))
}

fn parse_hunks(lines: &[&str]) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if let Some(header) = parse_hunk_header(line) {
            let (old_start, old_count, new_start, new_count, context_header) = header;
            let mut content = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].starts_with("@@") {
                if lines[i].starts_with('+')
                    || lines[i].starts_with('-')
                    || lines[i].starts_with(' ')
                    || lines[i].starts_with('\\')
                {
                    content.push(lines[i].to_owned());
                }
                i += 1;
            }
            hunks.push(Hunk {
                old_start,
                old_count,
                new_start,
                new_count,
                lines: content,
                context_header,
            });
        } else {
            i += 1;
        }
    }
    hunks
}

/// Parse `@@ -old_start[,old_count] +new_start[,new_count] @@ [header]`.
fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize, Option<String>)> {
    let rest = line.strip_prefix("@@ -")?;
    let (old_range, rest) = rest.split_once(' ')?;
    let rest = rest.strip_prefix('+')?;
    let (new_range, rest) = rest.split_once(" @@")?;
    let (old_start, old_count) = parse_range(old_range)?;
    let (new_start, new_count) = parse_range(new_range)?;
    let context_header = {
        let trimmed = rest.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    };
    Some((old_start, old_count, new_start, new_count, context_header))
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn tally(hunks: &[Hunk]) -> (usize, usize) {
    let mut additions = 0;
    let mut deletions = 0;
    for hunk in hunks {
        for line in &hunk.lines {
            if line.starts_with('+') {
                additions += 1;
            } else if line.starts_with('-') {
                deletions += 1;
            }
        }
    }
    (additions, deletions)
}

/// Normalize unified-diff text for patch-id hashing: drop `index `/`diff
/// --git` lines, collapse every hunk header to the literal `@@`, strip
/// trailing whitespace from kept lines, and drop empty lines.
fn normalize_for_patch_id(diff_text: &str) -> String {
    let mut normalized = String::new();
    for line in diff_text.lines() {
        if line.starts_with("index ") || line.starts_with("diff --git") {
            continue;
        }
        let line = if line.starts_with("@@ ") || line == "@@" {
            "@@"
        } else {
            line
        };
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        normalized.push_str(trimmed);
        normalized.push('\n');
    }
    normalized
}

/// The patch-id for a non-root commit: the SHA-1 of its diff text,
/// normalized so that line numbers and blob hashes don't affect the result.
/// Two commits with the same content change but different ancestry (e.g.
/// before and after a rebase) hash identically.
pub fn patch_id_from_diff(diff_text: &str) -> ObjectHash {
    let normalized = normalize_for_patch_id(diff_text);
    let mut hasher = Sha1::new();
    hasher.update(normalized.as_bytes());
    ObjectHash::from_digest(hasher.finalize().into())
}

/// The patch-id for a root commit: derived from the commit's own hash so it
/// never collides with a diff-derived patch-id (a root commit has no parent
/// to diff against).
pub fn patch_id_from_root_commit(hash: ObjectHash) -> ObjectHash {
    let mut hasher = Sha1::new();
    hasher.update(b"root:");
    hasher.update(hash.to_string().as_bytes());
    ObjectHash::from_digest(hasher.finalize().into())
}

/// Collect the set of patch-ids for every commit reachable from `include`
/// but not `exclude` (§4.2). Generic over [`CommitRange`] rather than a
/// concrete [`crate::repo::Repo`] — the capability seam that breaks the
/// cyclic dependency between the analyzer and the facade (see the design
/// notes): this module only ever asks for "commits in a range" and "the
/// patch-id of one commit", never for a tree or a blob directly.
pub fn collect_patch_ids<R: CommitRange>(
    repo: &R,
    include: &[ObjectHash],
    exclude: &[ObjectHash],
) -> Result<HashSet<ObjectHash>> {
    let commits = repo.commits_in_range(include, exclude, None)?;
    commits.iter().map(|c| repo.patch_id_for(c.hash)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_modify_hunk() {
        let text = "diff --git a/file_a.txt b/file_a.txt\n\
             index 1111111..2222222 100644\n\
             --- a/file_a.txt\n\
             +++ b/file_a.txt\n\
             @@ -1,3 +1,3 @@\n\
             -Main version\n\
             +Feature version\n\
             \u{20}Line 2\n\
             \u{20}Line 3\n";
        let changes = parse_unified_diff(text);
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.path, PathBuf::from("file_a.txt"));
        assert!(matches!(change.kind, ChangeKind::Modify));
        assert_eq!(change.hunks.len(), 1);
        assert_eq!(change.hunks[0].old_range(), (1, 4));
        assert_eq!(change.additions, 1);
        assert_eq!(change.deletions, 1);
    }

    #[test]
    fn parses_added_file() {
        let text = "diff --git a/feature.txt b/feature.txt\n\
             new file mode 100644\n\
             index 0000000..abcdefa\n\
             --- /dev/null\n\
             +++ b/feature.txt\n\
             @@ -0,0 +1 @@\n\
             +Feature content\n";
        let changes = parse_unified_diff(text);
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0].kind, ChangeKind::Add));
    }

    #[test]
    fn patch_id_is_stable_across_path_prefixes() {
        let a = "diff --git a/x.txt b/x.txt\nindex 111..222 100644\n--- a/x.txt\n+++ b/x.txt\n@@ -1 +1 @@\n-old\n+new\n";
        let b = "diff --git a/x.txt b/x.txt\nindex 333..444 100644\n--- a/x.txt\n+++ b/x.txt\n@@ -5,1 +5,1 @@\n-old\n+new\n";
        assert_eq!(patch_id_from_diff(a), patch_id_from_diff(b));
    }
}

//! The conflict detector: given two sets of file changes ("ours" and
//! "theirs"), predicts which paths will conflict without performing a real
//! three-way text merge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::model::{
    ChangeKind, ConflictDifficulty, ConflictSeverity, FileChange, OverlapRange, PotentialConflict,
};

/// Maximum gap, in lines, between two hunks' old-file ranges that still
/// counts as an overlap (see `P4`/boundary behaviors: gap = 3 conflicts,
/// gap = 4 does not).
const ADJACENCY_THRESHOLD: usize = 3;

/// Predict conflicts between `ours` (accumulated target-side changes) and
/// `theirs` (one incoming commit's or branch's changes).
pub fn detect_conflicts(ours: &[FileChange], theirs: &[FileChange]) -> Vec<PotentialConflict> {
    let mut conflicts = Vec::new();
    let mut seen_paths = std::collections::HashSet::new();

    let our_by_path = index_by_path(ours);
    let their_by_path = index_by_path(theirs);

    let common_paths: Vec<&PathBuf> = our_by_path
        .keys()
        .filter(|p| their_by_path.contains_key(*p))
        .sorted()
        .collect();

    for path in common_paths {
        let our_change = our_by_path[path];
        let their_change = their_by_path[path];
        if let Some(conflict) = classify_common_path(path, our_change, their_change) {
            seen_paths.insert(path.clone());
            conflicts.push(conflict);
        }
    }

    conflicts.extend(detect_delete_modify_conflicts(
        ours,
        theirs,
        &mut seen_paths,
    ));
    conflicts.extend(detect_rename_conflicts(ours, theirs, &mut seen_paths));

    conflicts.sort_by(|a, b| a.path.cmp(&b.path));
    conflicts
}

fn index_by_path(changes: &[FileChange]) -> HashMap<&PathBuf, &FileChange> {
    let mut map = HashMap::new();
    for change in changes {
        map.insert(&change.path, change);
    }
    map
}

/// Classify a path touched by both sides, per the §4.3 table. Delete/modify
/// and rename interactions are deliberately skipped here (return `None`) —
/// they're handled by their own passes below so a path isn't reported twice.
fn classify_common_path(
    path: &Path,
    ours: &FileChange,
    theirs: &FileChange,
) -> Option<PotentialConflict> {
    use ChangeKind::*;
    match (ours.kind, theirs.kind) {
        (Delete, Delete) => None,
        (Add, Add) if ours.new_blob.is_some() && ours.new_blob == theirs.new_blob => None,
        (Add, Add) => Some(certain(
            path,
            "both add with different content",
            ours,
            theirs,
        )),
        (Delete, Modify) | (Delete, Add) | (Modify, Delete) | (Add, Delete) => None,
        (Add, Modify) | (Modify, Add) => Some(certain(
            path,
            "file added on one side, modified on other",
            ours,
            theirs,
        )),
        (Modify, Modify) => {
            if ours.hunks.is_empty() || theirs.hunks.is_empty() {
                Some(likely(path, "could not analyze hunks", ours, theirs, Vec::new()))
            } else {
                classify_hunk_overlap(path, ours, theirs)
            }
        }
        (Rename, Modify) | (Modify, Rename) => {
            Some(likely(path, "rename/modify", ours, theirs, Vec::new()))
        }
        _ => None,
    }
}

fn classify_hunk_overlap(
    path: &Path,
    ours: &FileChange,
    theirs: &FileChange,
) -> Option<PotentialConflict> {
    let overlaps = find_overlapping_hunks(ours, theirs);
    if overlaps.is_empty() {
        return None;
    }
    let identical = overlaps.iter().all(|(our_hunk, their_hunk, _)| {
        our_hunk.changed_lines() == their_hunk.changed_lines()
    });
    let ranges: Vec<OverlapRange> = overlaps.iter().map(|(_, _, range)| *range).collect();
    if identical {
        Some(likely(
            path,
            "identical changes, may auto-resolve",
            ours,
            theirs,
            ranges,
        ))
    } else {
        Some(certain_with_ranges(
            path,
            "overlapping changes",
            ours,
            theirs,
            ranges,
        ))
    }
}

/// Two hunk ranges `[a0,a1)` and `[b0,b1)` conflict iff
/// `a0 <= b1 + 3 && b0 <= a1 + 3`.
fn find_overlapping_hunks<'a>(
    ours: &'a FileChange,
    theirs: &'a FileChange,
) -> Vec<(&'a crate::model::Hunk, &'a crate::model::Hunk, OverlapRange)> {
    let mut out = Vec::new();
    for our_hunk in &ours.hunks {
        let (a0, a1) = our_hunk.old_range();
        for their_hunk in &theirs.hunks {
            let (b0, b1) = their_hunk.old_range();
            if a0 <= b1 + ADJACENCY_THRESHOLD && b0 <= a1 + ADJACENCY_THRESHOLD {
                out.push((our_hunk, their_hunk, ((a0, a1), (b0, b1))));
            }
        }
    }
    out
}

/// Symmetric pass over *all* changes (not just common paths) for
/// delete/modify and delete/add interactions, in both directions.
fn detect_delete_modify_conflicts(
    ours: &[FileChange],
    theirs: &[FileChange],
    seen_paths: &mut std::collections::HashSet<PathBuf>,
) -> Vec<PotentialConflict> {
    let mut conflicts = Vec::new();
    for (deleters, others, deleters_are_ours) in [(ours, theirs, true), (theirs, ours, false)] {
        for deleted in deleters.iter().filter(|c| c.kind == ChangeKind::Delete) {
            if seen_paths.contains(&deleted.path) {
                continue;
            }
            if let Some(other) = others.iter().find(|c| {
                c.path == deleted.path && matches!(c.kind, ChangeKind::Modify | ChangeKind::Add)
            }) {
                seen_paths.insert(deleted.path.clone());
                let (our_change, their_change) = if deleters_are_ours {
                    (deleted, other)
                } else {
                    (other, deleted)
                };
                let verb = if other.kind == ChangeKind::Add {
                    "added"
                } else {
                    "modified"
                };
                conflicts.push(certain(
                    &deleted.path,
                    &format!("file deleted on one side, {verb} on the other"),
                    our_change,
                    their_change,
                ));
            }
        }
    }
    conflicts
}

/// Rename/rename-to-different-target and rename/modify-of-old-path passes,
/// over the full change lists. Uses a fallible `.find()` rather than an
/// unwrapping lookup: a rename with no counterpart change is simply not a
/// conflict, never a panic.
fn detect_rename_conflicts(
    ours: &[FileChange],
    theirs: &[FileChange],
    seen_paths: &mut std::collections::HashSet<PathBuf>,
) -> Vec<PotentialConflict> {
    let mut conflicts = Vec::new();
    for our_rename in ours.iter().filter(|c| c.kind == ChangeKind::Rename) {
        let Some(old_path) = &our_rename.old_path else {
            continue;
        };
        if let Some(their_rename) = theirs.iter().find(|c| {
            c.kind == ChangeKind::Rename && c.old_path.as_ref() == Some(old_path)
        }) {
            if their_rename.path != our_rename.path && seen_paths.insert(old_path.clone()) {
                conflicts.push(certain(
                    old_path,
                    "rename/rename",
                    our_rename,
                    their_rename,
                ));
            }
        }
    }

    // rename/modify-of-old-path: one side renames a file away while the
    // other side keeps modifying (or adding) it under its old path. Runs in
    // both directions since "ours" and "theirs" aren't symmetric callers.
    for (renamers, others, renamers_are_ours) in [(ours, theirs, true), (theirs, ours, false)] {
        for rename in renamers.iter().filter(|c| c.kind == ChangeKind::Rename) {
            let Some(old_path) = &rename.old_path else {
                continue;
            };
            if seen_paths.contains(old_path) {
                continue;
            }
            if let Some(other) = others.iter().find(|c| {
                &c.path == old_path && matches!(c.kind, ChangeKind::Modify | ChangeKind::Add)
            }) {
                seen_paths.insert(old_path.clone());
                let (our_change, their_change) = if renamers_are_ours {
                    (rename, other)
                } else {
                    (other, rename)
                };
                conflicts.push(likely(
                    old_path,
                    "rename/modify",
                    our_change,
                    their_change,
                    Vec::new(),
                ));
            }
        }
    }
    conflicts
}

fn certain(path: &Path, description: &str, ours: &FileChange, theirs: &FileChange) -> PotentialConflict {
    certain_with_ranges(path, description, ours, theirs, Vec::new())
}

fn certain_with_ranges(
    path: &Path,
    description: &str,
    ours: &FileChange,
    theirs: &FileChange,
    ranges: Vec<OverlapRange>,
) -> PotentialConflict {
    PotentialConflict {
        path: path.to_owned(),
        severity: ConflictSeverity::Certain,
        description: description.to_owned(),
        our_change: Some(ours.clone()),
        their_change: Some(theirs.clone()),
        overlapping_ranges: ranges,
    }
}

fn likely(
    path: &Path,
    description: &str,
    ours: &FileChange,
    theirs: &FileChange,
    ranges: Vec<OverlapRange>,
) -> PotentialConflict {
    PotentialConflict {
        path: path.to_owned(),
        severity: ConflictSeverity::Likely,
        description: description.to_owned(),
        our_change: Some(ours.clone()),
        their_change: Some(theirs.clone()),
        overlapping_ranges: ranges,
    }
}

/// Estimate how hard a predicted conflict would be to resolve by hand. Not
/// consumed by the core itself; exposed for a presentation layer.
pub fn estimate_difficulty(conflict: &PotentialConflict) -> ConflictDifficulty {
    if conflict.severity == ConflictSeverity::Likely {
        return ConflictDifficulty::Easy;
    }
    if conflict.overlapping_ranges.is_empty() {
        return ConflictDifficulty::Moderate;
    }
    let total_lines: usize = conflict
        .overlapping_ranges
        .iter()
        .map(|((a0, a1), (b0, b1))| (a1 - a0).max(b1 - b0))
        .sum();
    if total_lines <= 5 {
        ConflictDifficulty::Easy
    } else if total_lines <= 20 {
        ConflictDifficulty::Moderate
    } else {
        ConflictDifficulty::Hard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileChange, Hunk};

    fn modify(path: &str, hunk: Hunk) -> FileChange {
        FileChange {
            path: PathBuf::from(path),
            kind: ChangeKind::Modify,
            old_path: None,
            old_mode: None,
            new_mode: None,
            old_blob: None,
            new_blob: None,
            additions: 1,
            deletions: 1,
            hunks: vec![hunk],
        }
    }

    fn hunk(old_start: usize, old_count: usize, line: &str) -> Hunk {
        Hunk {
            old_start,
            old_count,
            new_start: old_start,
            new_count: old_count,
            lines: vec![line.to_owned()],
            context_header: None,
        }
    }

    #[test]
    fn disjoint_paths_do_not_conflict() {
        let ours = vec![modify("a.txt", hunk(1, 1, "-x"))];
        let theirs = vec![modify("b.txt", hunk(1, 1, "-y"))];
        assert!(detect_conflicts(&ours, &theirs).is_empty());
    }

    #[test]
    fn adjacent_within_threshold_conflicts() {
        let ours = vec![modify("a.txt", hunk(1, 1, "-x"))];
        let theirs = vec![modify("a.txt", hunk(5, 1, "-y"))]; // gap = 3
        let conflicts = detect_conflicts(&ours, &theirs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Certain);
    }

    #[test]
    fn gap_of_four_does_not_conflict() {
        let ours = vec![modify("a.txt", hunk(1, 1, "-x"))];
        let theirs = vec![modify("a.txt", hunk(6, 1, "-y"))]; // gap = 4
        assert!(detect_conflicts(&ours, &theirs).is_empty());
    }

    #[test]
    fn identical_overlap_is_likely() {
        let ours = vec![modify("a.txt", hunk(1, 1, "-same"))];
        let theirs = vec![modify("a.txt", hunk(1, 1, "-same"))];
        let conflicts = detect_conflicts(&ours, &theirs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Likely);
    }

    #[test]
    fn delete_modify_is_certain() {
        let ours = vec![FileChange {
            path: PathBuf::from("a.txt"),
            kind: ChangeKind::Delete,
            old_path: None,
            old_mode: None,
            new_mode: None,
            old_blob: None,
            new_blob: None,
            additions: 0,
            deletions: 3,
            hunks: vec![],
        }];
        let theirs = vec![modify("a.txt", hunk(1, 1, "-x"))];
        let conflicts = detect_conflicts(&ours, &theirs);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Certain);
        assert!(conflicts[0].description.contains("deleted"));
        assert!(conflicts[0].description.contains("modified"));
    }
}

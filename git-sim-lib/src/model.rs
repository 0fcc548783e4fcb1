//! The data model shared by every simulator: commit/branch/file-change
//! records, the commit-graph projection, and the uniform result shape that
//! all four operations convert into.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A 40-hex-character object hash (commit, tree, or blob), or a synthetic
/// hash produced by a simulator for display purposes only.
///
/// Synthetic hashes are valid SHA-1 hex strings but never correspond to an
/// object actually present in the store; see the simulators' `synthesize_*`
/// helpers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHash(#[serde(with = "oid_hex")] git2::Oid);

impl ObjectHash {
    pub(crate) fn from_oid(oid: git2::Oid) -> Self {
        ObjectHash(oid)
    }

    pub(crate) fn as_oid(&self) -> git2::Oid {
        self.0
    }

    /// The first seven hex characters, as Git's short-hash convention.
    pub fn short(&self) -> String {
        self.to_string()[..7].to_string()
    }

    /// Build an [`ObjectHash`] from 20 raw bytes, as produced by a SHA-1
    /// digest. Used only for synthetic hashes; never for resolving real refs.
    pub fn from_digest(bytes: [u8; 20]) -> Self {
        ObjectHash(git2::Oid::from_bytes(&bytes).expect("20 bytes is always a valid Oid"))
    }

    /// The all-zero hash, used as a placeholder where a tree hash is
    /// deliberately left uncomputed (e.g. a synthesized merge commit).
    pub fn zero() -> Self {
        ObjectHash(git2::Oid::zero())
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.0)
    }
}

impl FromStr for ObjectHash {
    type Err = git2::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ObjectHash(git2::Oid::from_str(s)?))
    }
}

mod oid_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(oid: &git2::Oid, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&oid.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<git2::Oid, D::Error> {
        let s = String::deserialize(deserializer)?;
        git2::Oid::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A single commit, as recorded in the object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: ObjectHash,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: i64,
    pub parent_hashes: Vec<ObjectHash>,
    pub tree_hash: ObjectHash,
}

impl CommitInfo {
    /// The first line of the commit message.
    pub fn first_line(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// `true` if this commit has two or more parents.
    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() >= 2
    }

    /// `true` if this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parent_hashes.is_empty()
    }

    /// The commit timestamp as a UTC `DateTime`, for presentation layers
    /// that want to render it rather than the raw Unix seconds.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// A branch (local or remote-tracking).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub tip: ObjectHash,
    pub is_remote: bool,
}

/// The kind of change a [`FileChange`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
    Rename,
    Copy,
}

/// One hunk of a unified diff for a single file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    /// Content lines, each still carrying its '+' / '-' / ' ' / '\\' prefix.
    pub lines: Vec<String>,
    /// The function/section header Git sometimes appends to `@@ ... @@`.
    pub context_header: Option<String>,
}

impl Hunk {
    /// The old-file line range, as a half-open interval.
    pub fn old_range(&self) -> (usize, usize) {
        (self.old_start, self.old_start + self.old_count)
    }

    /// The `+`/`-` content lines only, used to compare two hunks for
    /// byte-identical overlap.
    pub fn changed_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.starts_with('+') || l.starts_with('-'))
            .map(String::as_str)
            .collect()
    }
}

/// One file's change between two trees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub old_path: Option<PathBuf>,
    pub old_mode: Option<u32>,
    pub new_mode: Option<u32>,
    pub old_blob: Option<ObjectHash>,
    pub new_blob: Option<ObjectHash>,
    pub additions: usize,
    pub deletions: usize,
    pub hunks: Vec<Hunk>,
}

impl FileChange {
    /// A MODIFY change with no parsed hunks is treated as a binary file.
    pub fn is_binary(&self) -> bool {
        matches!(self.kind, ChangeKind::Modify) && self.hunks.is_empty()
    }
}

/// How certain the conflict detector is that a path will actually conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConflictSeverity {
    Likely,
    Certain,
}

/// A pair of old-file line ranges, `(ours, theirs)`, that overlap.
pub type OverlapRange = ((usize, usize), (usize, usize));

/// A predicted conflict on a single path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialConflict {
    pub path: PathBuf,
    pub severity: ConflictSeverity,
    pub description: String,
    pub our_change: Option<FileChange>,
    pub their_change: Option<FileChange>,
    pub overlapping_ranges: Vec<OverlapRange>,
}

/// How hard a predicted conflict is likely to be to resolve by hand. Not
/// used by the core itself; exposed for a presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictDifficulty {
    Easy,
    Moderate,
    Hard,
}

/// A projection of the commit DAG reachable from a set of refs, built fresh
/// for display before and after a simulated operation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommitGraph {
    pub commits: HashMap<ObjectHash, CommitInfo>,
    pub edges: Vec<(ObjectHash, ObjectHash)>,
    pub branch_tips: HashMap<String, ObjectHash>,
    pub current_tip: Option<ObjectHash>,
    pub current_branch: Option<String>,
}

impl CommitGraph {
    /// Add a commit and its first-level parent edges to the graph. Safe to
    /// call more than once for the same commit (idempotent).
    pub fn add_commit(&mut self, commit: CommitInfo) {
        if self.commits.contains_key(&commit.hash) {
            return;
        }
        for parent in &commit.parent_hashes {
            self.edges.push((commit.hash, *parent));
        }
        self.commits.insert(commit.hash, commit);
    }
}

/// What a single [`OperationStep`] does to the commit it carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    Pick,
    Skip,
    Merge,
    Reset,
    Drop,
    Squash,
    Fixup,
    Reword,
}

/// One commit being replayed (or skipped) as part of an operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationStep {
    pub step_number: usize,
    pub action: StepAction,
    pub commit: CommitInfo,
    pub new_hash: Option<ObjectHash>,
    pub conflicts: Vec<PotentialConflict>,
    pub skipped: bool,
    pub description: String,
}

/// Reset depth, mirroring `git reset --soft|--mixed|--hard`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetMode {
    Soft,
    Mixed,
    Hard,
}

impl ResetMode {
    /// Parse a `--soft`/`--mixed`/`--hard` style string, defaulting to
    /// `Mixed` for anything unrecognized (matches plain `git reset <target>`,
    /// which defaults to mixed).
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "soft" => ResetMode::Soft,
            "hard" => ResetMode::Hard,
            _ => ResetMode::Mixed,
        }
    }
}

/// How risky a predicted operation is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DangerLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Safety annotation attached to a [`UniformResult`] by the dispatcher (or,
/// for reset, by the simulator itself).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyInfo {
    pub danger_level: DangerLevel,
    pub reasons: Vec<String>,
    pub suggestions: Vec<String>,
    pub reversible: bool,
    pub requires_force_push: bool,
}

impl Default for SafetyInfo {
    fn default() -> Self {
        SafetyInfo {
            danger_level: DangerLevel::Low,
            reasons: Vec::new(),
            suggestions: Vec::new(),
            reversible: true,
            requires_force_push: false,
        }
    }
}

/// Which of the four operations a [`UniformResult`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Rebase,
    Merge,
    Reset,
    CherryPick,
}

/// The rebase-specific simulation record. Convertible to [`UniformResult`]
/// via [`RebaseRecord::into_uniform_result`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebaseRecord {
    pub source: String,
    pub target: String,
    pub onto_hash: ObjectHash,
    pub merge_base_hash: ObjectHash,
    pub steps: Vec<OperationStep>,
    pub before_graph: CommitGraph,
    pub after_graph: CommitGraph,
}

/// The merge-specific simulation record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeRecord {
    pub source_branch: String,
    pub target_branch: String,
    pub merge_base_hash: ObjectHash,
    pub merge_commit_hash: ObjectHash,
    pub strategy: String,
    pub is_fast_forward: bool,
    pub conflicts: Vec<PotentialConflict>,
    pub files_merged_cleanly: Vec<PathBuf>,
    pub before_graph: CommitGraph,
    pub after_graph: CommitGraph,
}

/// The reset-specific simulation record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResetRecord {
    pub target_hash: ObjectHash,
    pub mode: ResetMode,
    pub current_hash: ObjectHash,
    pub commits_detached: Vec<CommitInfo>,
    pub files_unstaged: Vec<PathBuf>,
    pub files_discarded: Vec<PathBuf>,
    pub before_graph: CommitGraph,
    pub after_graph: CommitGraph,
}

/// The cherry-pick-specific simulation record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CherryPickRecord {
    pub commits_to_pick: Vec<CommitInfo>,
    pub target_branch: String,
    pub steps: Vec<OperationStep>,
    pub before_graph: CommitGraph,
    pub after_graph: CommitGraph,
}

/// The cross-operation record every simulator's output converts into. The
/// presentation layer only needs to know this shape, never the four
/// per-operation record types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniformResult {
    pub operation: OperationKind,
    pub success: bool,
    pub before_graph: CommitGraph,
    pub after_graph: CommitGraph,
    pub conflicts: Vec<PotentialConflict>,
    pub commits_affected: Vec<ObjectHash>,
    pub commits_dropped: Vec<ObjectHash>,
    pub commits_created: Vec<ObjectHash>,
    pub warnings: Vec<String>,
    pub safety_info: Option<SafetyInfo>,
    pub source_ref: String,
    pub target_ref: String,
    pub merge_base: Option<ObjectHash>,
    pub new_head: Option<ObjectHash>,
    pub steps: Vec<OperationStep>,
}

impl UniformResult {
    /// Number of predicted conflicts, for `P6` (`success == no CERTAIN
    /// conflicts`, `conflict_count == conflicts.len()`).
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    fn has_certain_conflict(conflicts: &[PotentialConflict]) -> bool {
        conflicts
            .iter()
            .any(|c| c.severity == ConflictSeverity::Certain)
    }
}

impl RebaseRecord {
    /// Convert to the cross-operation shape. The dispatcher layers safety
    /// info on afterward; see [`crate::dispatcher`].
    pub fn into_uniform_result(self) -> UniformResult {
        let conflicts: Vec<PotentialConflict> = self
            .steps
            .iter()
            .flat_map(|s| s.conflicts.clone())
            .collect();
        let commits_affected: Vec<ObjectHash> = self.steps.iter().map(|s| s.commit.hash).collect();
        let commits_dropped: Vec<ObjectHash> = self
            .steps
            .iter()
            .filter(|s| s.skipped)
            .map(|s| s.commit.hash)
            .collect();
        let commits_created: Vec<ObjectHash> = self
            .steps
            .iter()
            .filter_map(|s| if s.skipped { None } else { s.new_hash })
            .collect();
        let new_head = commits_created.last().copied().or(Some(self.onto_hash));
        let success = !UniformResult::has_certain_conflict(&conflicts);
        UniformResult {
            operation: OperationKind::Rebase,
            success,
            before_graph: self.before_graph,
            after_graph: self.after_graph,
            conflicts,
            commits_affected,
            commits_dropped,
            commits_created,
            warnings: Vec::new(),
            safety_info: None,
            source_ref: self.source,
            target_ref: self.target,
            merge_base: Some(self.merge_base_hash),
            new_head,
            steps: self.steps,
        }
    }
}

impl MergeRecord {
    /// Convert to the cross-operation shape.
    pub fn into_uniform_result(self) -> UniformResult {
        let success = !UniformResult::has_certain_conflict(&self.conflicts);
        let commits_created = if self.is_fast_forward {
            Vec::new()
        } else {
            vec![self.merge_commit_hash]
        };
        UniformResult {
            operation: OperationKind::Merge,
            success,
            before_graph: self.before_graph,
            after_graph: self.after_graph,
            conflicts: self.conflicts,
            commits_affected: Vec::new(),
            commits_dropped: Vec::new(),
            commits_created,
            warnings: Vec::new(),
            safety_info: None,
            source_ref: self.source_branch,
            target_ref: self.target_branch,
            merge_base: Some(self.merge_base_hash),
            new_head: Some(self.merge_commit_hash),
            steps: Vec::new(),
        }
    }
}

impl ResetRecord {
    /// Convert to the cross-operation shape, including the reset-specific
    /// safety annotation computed directly (§4.6), since reset's safety
    /// doesn't depend on conflicts like the other three operations.
    pub fn into_uniform_result(self) -> UniformResult {
        let danger = match (self.mode, self.files_discarded.is_empty()) {
            (ResetMode::Hard, false) => DangerLevel::High,
            (ResetMode::Hard, true) => DangerLevel::Medium,
            (_, _) if !self.commits_detached.is_empty() => DangerLevel::Medium,
            _ => DangerLevel::Low,
        };
        let mut reasons = Vec::new();
        if !self.commits_detached.is_empty() {
            reasons.push(format!(
                "{} commit(s) will become unreachable",
                self.commits_detached.len()
            ));
        }
        let safety_info = Some(SafetyInfo {
            danger_level: danger,
            reasons,
            suggestions: Vec::new(),
            reversible: self.mode != ResetMode::Hard,
            requires_force_push: false,
        });
        let commits_dropped: Vec<ObjectHash> =
            self.commits_detached.iter().map(|c| c.hash).collect();
        UniformResult {
            operation: OperationKind::Reset,
            success: true,
            before_graph: self.before_graph,
            after_graph: self.after_graph,
            conflicts: Vec::new(),
            commits_affected: Vec::new(),
            commits_dropped,
            commits_created: Vec::new(),
            warnings: Vec::new(),
            safety_info,
            source_ref: String::new(),
            target_ref: self.target_hash.to_string(),
            merge_base: None,
            new_head: Some(self.target_hash),
            steps: Vec::new(),
        }
    }
}

impl CherryPickRecord {
    /// Convert to the cross-operation shape.
    pub fn into_uniform_result(self) -> UniformResult {
        let conflicts: Vec<PotentialConflict> = self
            .steps
            .iter()
            .flat_map(|s| s.conflicts.clone())
            .collect();
        let commits_affected: Vec<ObjectHash> = self.steps.iter().map(|s| s.commit.hash).collect();
        let commits_created: Vec<ObjectHash> =
            self.steps.iter().filter_map(|s| s.new_hash).collect();
        let new_head = commits_created.last().copied();
        let success = !UniformResult::has_certain_conflict(&conflicts);
        UniformResult {
            operation: OperationKind::CherryPick,
            success,
            before_graph: self.before_graph,
            after_graph: self.after_graph,
            conflicts,
            commits_affected,
            commits_dropped: Vec::new(),
            commits_created,
            warnings: Vec::new(),
            safety_info: None,
            source_ref: self
                .commits_to_pick
                .first()
                .map(|c| c.hash.to_string())
                .unwrap_or_default(),
            target_ref: self.target_branch,
            merge_base: None,
            new_head,
            steps: self.steps,
        }
    }
}

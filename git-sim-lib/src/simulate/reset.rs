//! Reset simulation (§4.6): which commits become unreachable from the
//! current branch, and which working-tree/index files are touched,
//! depending on `--soft`/`--mixed`/`--hard`.

use tracing::instrument;

use crate::error::Result;
use crate::graph::build_graph;
use crate::model::{ResetMode, ResetRecord};
use crate::repo::Repo;

use super::Simulator;

/// Simulates `git reset [--soft|--mixed|--hard] <target>` against the
/// current `HEAD`.
pub struct ResetSimulator {
    pub target: String,
    pub mode: ResetMode,
}

impl ResetSimulator {
    pub fn new(target: impl Into<String>, mode: ResetMode) -> Self {
        ResetSimulator {
            target: target.into(),
            mode,
        }
    }
}

impl Simulator for ResetSimulator {
    type Output = ResetRecord;

    #[instrument(skip(self, repo), fields(target = %self.target, mode = ?self.mode))]
    fn validate(&self, repo: &Repo) -> Result<(Vec<String>, Vec<String>)> {
        let mut warnings = Vec::new();

        let target = match repo.get_commit(&self.target) {
            Ok(c) => c,
            Err(_) => {
                return Ok((vec![format!("target not found: {}", self.target)], warnings))
            }
        };
        let current = repo.get_commit("HEAD")?;

        if target.hash == current.hash {
            warnings.push("already at target; nothing to reset".to_owned());
        }
        if self.mode == ResetMode::Hard {
            warnings.push(
                "hard reset discards uncommitted changes and detached commits irreversibly"
                    .to_owned(),
            );
        }

        Ok((Vec::new(), warnings))
    }

    #[instrument(skip(self, repo), fields(target = %self.target, mode = ?self.mode))]
    fn simulate(&self, repo: &Repo) -> Result<ResetRecord> {
        let target = repo.get_commit(&self.target)?;
        let current = repo.get_commit("HEAD")?;

        let commits_detached = repo.walk_commits(&[current.hash], &[target.hash], None)?;

        let changed_paths = affected_paths(repo, &commits_detached)?;

        let (files_unstaged, files_discarded) = match self.mode {
            ResetMode::Soft => (Vec::new(), Vec::new()),
            ResetMode::Mixed => (changed_paths, Vec::new()),
            ResetMode::Hard => (Vec::new(), changed_paths),
        };

        let before_graph = build_graph(repo, &[current.hash], 20)?;
        let after_graph = build_after_graph(repo, target.hash, &commits_detached)?;

        Ok(ResetRecord {
            target_hash: target.hash,
            mode: self.mode,
            current_hash: current.hash,
            commits_detached,
            files_unstaged,
            files_discarded,
            before_graph,
            after_graph,
        })
    }
}

/// Union of every path touched by any of `detached`'s own commit diffs
/// (against each commit's first parent), sorted and de-duplicated. Per
/// §4.6 this is a union over the detached commits' own changes, not a net
/// tree diff of target-vs-current — a path added then deleted again within
/// the detached range must still show up as affected.
fn affected_paths(
    repo: &Repo,
    detached: &[crate::model::CommitInfo],
) -> Result<Vec<std::path::PathBuf>> {
    use itertools::Itertools;
    let mut paths: Vec<std::path::PathBuf> = Vec::new();
    for commit in detached {
        paths.extend(
            repo.get_commit_changes(commit.hash)?
                .into_iter()
                .map(|change| change.path),
        );
    }
    Ok(paths.into_iter().sorted().dedup().collect())
}

/// Walk from `target_hash` and register each `detached` commit alongside it,
/// without adding edges from the target's history into them — they appear
/// in the commit map as orphans, exactly as they'd sit in the object store
/// after the real reset drops them from any reachable ref.
fn build_after_graph(
    repo: &Repo,
    target_hash: crate::model::ObjectHash,
    detached: &[crate::model::CommitInfo],
) -> Result<crate::model::CommitGraph> {
    let mut graph = build_graph(repo, &[target_hash], 20)?;
    for commit in detached {
        let orphan = crate::model::CommitInfo {
            parent_hashes: Vec::new(),
            ..commit.clone()
        };
        graph.add_commit(orphan);
    }
    graph.current_tip = Some(target_hash);
    if let Some(branch) = graph.current_branch.clone() {
        graph.branch_tips.insert(branch, target_hash);
    }
    Ok(graph)
}

//! Cherry-pick simulation (§4.7): replays an ordered list of commits onto a
//! target, seeding conflict-proximity from the target's recent history.

use tracing::instrument;

use crate::conflict::detect_conflicts;
use crate::error::Result;
use crate::graph::build_graph;
use crate::model::{CherryPickRecord, CommitInfo, ObjectHash, OperationStep, StepAction};
use crate::repo::Repo;

use super::{synthesize_hash, Simulator};

/// How many of the target's own recent commits seed `accumulated` for
/// conflict proximity before the first picked commit is considered.
const TARGET_CONTEXT_DEPTH: usize = 10;

/// How many ancestors to walk when checking whether a commit is already
/// present in the target's history.
const ALREADY_PRESENT_SEARCH_DEPTH: usize = 1000;

/// Simulates `git cherry-pick <commit>...` onto `target` (default current
/// tip).
pub struct CherryPickSimulator {
    pub commits: Vec<String>,
    pub target: String,
}

impl CherryPickSimulator {
    pub fn new(commits: Vec<String>, target: impl Into<String>) -> Self {
        CherryPickSimulator {
            commits,
            target: target.into(),
        }
    }
}

impl Simulator for CherryPickSimulator {
    type Output = CherryPickRecord;

    #[instrument(skip(self, repo), fields(target = %self.target, count = self.commits.len()))]
    fn validate(&self, repo: &Repo) -> Result<(Vec<String>, Vec<String>)> {
        let mut warnings = Vec::new();

        if self.commits.is_empty() {
            return Ok((vec!["no commits given to cherry-pick".to_owned()], warnings));
        }

        let target = match repo.get_commit(&self.target) {
            Ok(c) => c,
            Err(_) => {
                return Ok((vec![format!("target not found: {}", self.target)], warnings))
            }
        };

        let target_ancestors = repo.walk_commits(
            &[target.hash],
            &[],
            Some(ALREADY_PRESENT_SEARCH_DEPTH),
        )?;
        let target_ancestor_hashes: std::collections::HashSet<ObjectHash> =
            target_ancestors.iter().map(|c| c.hash).collect();

        for reference in &self.commits {
            let commit = match repo.get_commit(reference) {
                Ok(c) => c,
                Err(_) => {
                    return Ok((vec![format!("commit not found: {reference}")], warnings))
                }
            };
            if target_ancestor_hashes.contains(&commit.hash) {
                warnings.push(format!(
                    "{} is already present in {}'s history",
                    commit.hash.short(),
                    self.target
                ));
            }
            if commit.is_merge() {
                warnings.push(format!(
                    "{} is a merge commit; cherry-picking merge commits is not fully modeled",
                    commit.hash.short()
                ));
            }
        }

        Ok((Vec::new(), warnings))
    }

    #[instrument(skip(self, repo), fields(target = %self.target, count = self.commits.len()))]
    fn simulate(&self, repo: &Repo) -> Result<CherryPickRecord> {
        let target = repo.get_commit(&self.target)?;
        let commits_to_pick: Vec<CommitInfo> = self
            .commits
            .iter()
            .map(|reference| repo.get_commit(reference))
            .collect::<Result<_>>()?;

        let recent_target_commits =
            repo.walk_commits(&[target.hash], &[], Some(TARGET_CONTEXT_DEPTH))?;
        let mut accumulated = Vec::new();
        for commit in &recent_target_commits {
            accumulated.extend(repo.get_commit_changes(commit.hash)?);
        }

        let mut steps = Vec::with_capacity(commits_to_pick.len());
        let mut simulated_head = target.hash;
        for (i, commit) in commits_to_pick.iter().enumerate() {
            let step_number = i + 1;
            let their_changes = repo.get_commit_changes(commit.hash)?;
            let conflicts = detect_conflicts(&accumulated, &their_changes);
            let new_hash = synthesize_hash(commit.hash, simulated_head, step_number);
            steps.push(OperationStep {
                step_number,
                action: StepAction::Pick,
                description: format!(
                    "cherry-pick {}: {}",
                    commit.hash.short(),
                    truncate(commit.first_line(), 40)
                ),
                commit: commit.clone(),
                new_hash: Some(new_hash),
                conflicts,
                skipped: false,
            });
            accumulated.extend(their_changes);
            simulated_head = new_hash;
        }

        let mut graph_refs: Vec<ObjectHash> = vec![target.hash];
        graph_refs.extend(commits_to_pick.iter().map(|c| c.hash));
        let before_graph = build_graph(repo, &graph_refs, 30)?;
        let after_graph = build_after_graph(repo, target.hash, &steps)?;

        Ok(CherryPickRecord {
            commits_to_pick,
            target_branch: self.target.clone(),
            steps,
            before_graph,
            after_graph,
        })
    }
}

fn build_after_graph(
    repo: &Repo,
    target_hash: ObjectHash,
    steps: &[OperationStep],
) -> Result<crate::model::CommitGraph> {
    let mut graph = build_graph(repo, &[target_hash], 15)?;
    let mut previous = target_hash;
    for step in steps {
        if let Some(new_hash) = step.new_hash {
            let synthesized = CommitInfo {
                hash: new_hash,
                parent_hashes: vec![previous],
                ..step.commit.clone()
            };
            graph.add_commit(synthesized);
            previous = new_hash;
        }
    }
    graph.current_tip = Some(previous);
    if let Some(branch) = graph.current_branch.clone() {
        graph.branch_tips.insert(branch, previous);
    }
    Ok(graph)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{checkout_branch, commit_all, init_repo, set_branch, write_file};

    #[test]
    fn clean_pick_produces_one_unskipped_step() {
        let (dir, git_repo) = init_repo();
        write_file(dir.path(), "a.txt", "1\n");
        let base = commit_all(&git_repo, "Base", &[]);
        set_branch(&git_repo, "main", base);
        checkout_branch(&git_repo, "main");

        set_branch(&git_repo, "feature", base);
        checkout_branch(&git_repo, "feature");
        write_file(dir.path(), "feature.txt", "feature content\n");
        let pick = commit_all(&git_repo, "AddFeature", &[base]);

        checkout_branch(&git_repo, "main");
        let repo = Repo::open(dir.path()).expect("open repo");
        let (record, warnings) = CherryPickSimulator::new(vec![pick.to_string()], "main")
            .run(&repo)
            .expect("cherry-pick should validate");

        assert_eq!(record.steps.len(), 1);
        assert!(!record.steps[0].skipped);
        assert!(record.steps[0].new_hash.is_some());
        assert!(record.steps[0].conflicts.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn picking_a_commit_already_in_target_history_warns() {
        let (dir, git_repo) = init_repo();
        write_file(dir.path(), "a.txt", "1\n");
        let base = commit_all(&git_repo, "Base", &[]);
        write_file(dir.path(), "b.txt", "2\n");
        let already_applied = commit_all(&git_repo, "AlreadyApplied", &[base]);
        set_branch(&git_repo, "main", already_applied);
        checkout_branch(&git_repo, "main");

        let repo = Repo::open(dir.path()).expect("open repo");
        let (record, warnings) =
            CherryPickSimulator::new(vec![already_applied.to_string()], "main")
                .run(&repo)
                .expect("cherry-pick should validate");

        assert!(warnings
            .iter()
            .any(|w| w.contains("already present in") && w.contains("history")));
        // cherry-pick never auto-skips (unlike rebase's patch-id dedup); it
        // still produces a replay step and leaves the decision to the caller.
        assert_eq!(record.steps.len(), 1);
        assert!(!record.steps[0].skipped);
    }
}

//! Rebase simulation (§4.4): predicts which commits replay, which are
//! skipped as duplicate patches, and what conflicts a replay would hit.

use tracing::instrument;

use crate::conflict::detect_conflicts;
use crate::error::{Error, Result};
use crate::graph::build_graph;
use crate::model::{CommitInfo, ObjectHash, OperationStep, RebaseRecord, StepAction};
use crate::repo::Repo;

use super::{synthesize_hash, Simulator};

/// Simulates `git rebase [--onto] <onto>` with `source` (default `HEAD`) as
/// the branch being replayed.
pub struct RebaseSimulator {
    pub source: String,
    pub onto: String,
}

impl RebaseSimulator {
    pub fn new(source: impl Into<String>, onto: impl Into<String>) -> Self {
        RebaseSimulator {
            source: source.into(),
            onto: onto.into(),
        }
    }
}

impl Simulator for RebaseSimulator {
    type Output = RebaseRecord;

    #[instrument(skip(self, repo), fields(source = %self.source, onto = %self.onto))]
    fn validate(&self, repo: &Repo) -> Result<(Vec<String>, Vec<String>)> {
        let mut warnings = Vec::new();

        let source_hash = match repo.get_commit(&self.source) {
            Ok(c) => c.hash,
            Err(_) => {
                return Ok((vec![format!("source ref not found: {}", self.source)], warnings))
            }
        };
        let onto_hash = match repo.get_commit(&self.onto) {
            Ok(c) => c.hash,
            Err(_) => return Ok((vec![format!("onto ref not found: {}", self.onto)], warnings)),
        };

        if source_hash == onto_hash {
            warnings.push("source and onto are the same commit".to_owned());
        }

        let merge_base = repo.find_merge_base(source_hash, onto_hash)?;
        let Some(merge_base) = merge_base else {
            return Ok((
                vec![format!(
                    "no common ancestor between '{}' and '{}'",
                    self.source, self.onto
                )],
                warnings,
            ));
        };

        if merge_base == onto_hash {
            warnings.push("already based on the target; rebase is a no-op".to_owned());
        }
        if merge_base == source_hash {
            warnings.push("onto is ahead of source; a reset would suffice".to_owned());
        }

        Ok((Vec::new(), warnings))
    }

    #[instrument(skip(self, repo), fields(source = %self.source, onto = %self.onto))]
    fn simulate(&self, repo: &Repo) -> Result<RebaseRecord> {
        let source = repo.get_commit(&self.source)?;
        let onto = repo.get_commit(&self.onto)?;
        let merge_base = repo
            .find_merge_base(source.hash, onto.hash)?
            .ok_or_else(|| Error::RefNotFound {
                reference: format!("merge-base({}, {})", self.source, self.onto),
            })?;

        let mut commits_to_replay =
            repo.walk_commits(&[source.hash], &[merge_base], None)?;
        commits_to_replay.reverse(); // oldest first

        let onto_patch_ids = repo.collect_patch_ids(&[onto.hash], &[merge_base])?;
        let onto_changes = repo.collect_changes(&[onto.hash], &[merge_base])?;

        let mut accumulated = onto_changes;
        let mut steps = Vec::with_capacity(commits_to_replay.len());
        for (i, commit) in commits_to_replay.into_iter().enumerate() {
            let step_number = i + 1;
            let patch_id = repo.get_patch_id(commit.hash)?;
            if onto_patch_ids.contains(&patch_id) {
                steps.push(skipped_step(step_number, commit));
                continue;
            }
            let their_changes = repo.get_commit_changes(commit.hash)?;
            let conflicts = detect_conflicts(&accumulated, &their_changes);
            let new_hash = synthesize_hash(commit.hash, onto.hash, step_number);
            steps.push(OperationStep {
                step_number,
                action: StepAction::Pick,
                description: format!(
                    "pick {}: {}",
                    commit.hash.short(),
                    truncate(commit.first_line(), 40)
                ),
                commit,
                new_hash: Some(new_hash),
                conflicts,
                skipped: false,
            });
            accumulated.extend(their_changes);
        }

        let before_graph = build_graph(repo, &[source.hash, onto.hash], 30)?;
        let after_graph = build_after_graph(repo, onto.hash, &steps)?;

        Ok(RebaseRecord {
            source: self.source.clone(),
            target: self.onto.clone(),
            onto_hash: onto.hash,
            merge_base_hash: merge_base,
            steps,
            before_graph,
            after_graph,
        })
    }
}

fn skipped_step(step_number: usize, commit: CommitInfo) -> OperationStep {
    OperationStep {
        step_number,
        action: StepAction::Skip,
        description: format!(
            "skip {}: {} (already present upstream)",
            commit.hash.short(),
            truncate(commit.first_line(), 40)
        ),
        commit,
        new_hash: None,
        conflicts: Vec::new(),
        skipped: true,
    }
}

fn build_after_graph(
    repo: &Repo,
    onto_hash: ObjectHash,
    steps: &[OperationStep],
) -> Result<crate::model::CommitGraph> {
    let mut graph = build_graph(repo, &[onto_hash], 15)?;
    let mut previous = onto_hash;
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

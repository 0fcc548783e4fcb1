//! Merge simulation (§4.5): fast-forward detection, conflict prediction,
//! and the synthesized merge commit for the non-fast-forward case.

use tracing::instrument;

use crate::conflict::detect_conflicts;
use crate::error::{Error, Result};
use crate::graph::build_graph;
use crate::model::{CommitInfo, MergeRecord, ObjectHash};
use crate::repo::Repo;

use super::Simulator;

/// Simulates merging `source` into `target` (default `HEAD`).
pub struct MergeSimulator {
    pub source: String,
    pub target: String,
    pub no_ff: bool,
    pub strategy: String,
}

impl MergeSimulator {
    pub fn new(source: impl Into<String>, target: impl Into<String>, no_ff: bool) -> Self {
        MergeSimulator {
            source: source.into(),
            target: target.into(),
            no_ff,
            strategy: "ort".to_owned(),
        }
    }
}

impl Simulator for MergeSimulator {
    type Output = MergeRecord;

    #[instrument(skip(self, repo), fields(source = %self.source, target = %self.target))]
    fn validate(&self, repo: &Repo) -> Result<(Vec<String>, Vec<String>)> {
        let mut warnings = Vec::new();

        let source = match repo.get_commit(&self.source) {
            Ok(c) => c,
            Err(_) => {
                return Ok((vec![format!("source branch not found: {}", self.source)], warnings))
            }
        };
        let target = match repo.get_commit(&self.target) {
            Ok(c) => c,
            Err(_) => {
                return Ok((vec![format!("target branch not found: {}", self.target)], warnings))
            }
        };

        if source.hash == target.hash {
            warnings.push("source and target are the same commit; nothing to merge".to_owned());
        }

        let Some(merge_base) = repo.find_merge_base(source.hash, target.hash)? else {
            return Ok((
                vec![format!(
                    "no common ancestor between '{}' and '{}'",
                    self.source, self.target
                )],
                warnings,
            ));
        };

        if merge_base == target.hash {
            if self.no_ff {
                warnings.push(
                    "fast-forward is possible, but --no-ff was specified; a merge commit will be created"
                        .to_owned(),
                );
            } else {
                warnings.push("this will be a fast-forward merge".to_owned());
            }
        }
        if merge_base == source.hash {
            warnings.push(format!("'{}' is already merged into '{}'", self.source, self.target));
        }

        Ok((Vec::new(), warnings))
    }

    #[instrument(skip(self, repo), fields(source = %self.source, target = %self.target))]
    fn simulate(&self, repo: &Repo) -> Result<MergeRecord> {
        let source = repo.get_commit(&self.source)?;
        let target = repo.get_commit(&self.target)?;
        let merge_base = repo
            .find_merge_base(source.hash, target.hash)?
            .ok_or_else(|| Error::RefNotFound {
                reference: format!("merge-base({}, {})", self.source, self.target),
            })?;

        let is_fast_forward = merge_base == target.hash && !self.no_ff;

        let source_changes = repo.collect_changes(&[source.hash], &[merge_base])?;
        let target_changes = repo.collect_changes(&[target.hash], &[merge_base])?;

        let conflicts = detect_conflicts(&target_changes, &source_changes);
        let files_merged_cleanly = find_clean_merges(&source_changes, &target_changes, &conflicts);

        let merge_commit_hash = if is_fast_forward {
            source.hash
        } else {
            synthesize_merge_hash(source.hash, target.hash)
        };

        let before_graph = build_graph(repo, &[source.hash, target.hash], 30)?;
        let after_graph = build_after_graph(
            repo,
            &source,
            &target,
            merge_commit_hash,
            is_fast_forward,
            &self.source,
            &self.target,
        )?;

        let target_branch = if self.target == "HEAD" {
            repo.head_branch().unwrap_or_else(|| "HEAD".to_owned())
        } else {
            self.target.clone()
        };

        Ok(MergeRecord {
            source_branch: self.source.clone(),
            target_branch,
            merge_base_hash: merge_base,
            merge_commit_hash,
            strategy: self.strategy.clone(),
            is_fast_forward,
            conflicts,
            files_merged_cleanly,
            before_graph,
            after_graph,
        })
    }
}

fn find_clean_merges(
    source_changes: &[crate::model::FileChange],
    target_changes: &[crate::model::FileChange],
    conflicts: &[crate::model::PotentialConflict],
) -> Vec<std::path::PathBuf> {
    use itertools::Itertools;
    use std::collections::HashSet;
    let conflict_paths: HashSet<_> = conflicts.iter().map(|c| &c.path).collect();
    let source_paths: HashSet<_> = source_changes.iter().map(|c| &c.path).collect();
    let target_paths: HashSet<_> = target_changes.iter().map(|c| &c.path).collect();

    source_paths
        .symmetric_difference(&target_paths)
        .chain(
            source_paths
                .intersection(&target_paths)
                .filter(|p| !conflict_paths.contains(*p)),
        )
        .map(|p| (*p).clone())
        .sorted()
        .dedup()
        .collect()
}

fn synthesize_merge_hash(source_hash: ObjectHash, target_hash: ObjectHash) -> ObjectHash {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(b"merge:");
    hasher.update(source_hash.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(target_hash.to_string().as_bytes());
    ObjectHash::from_digest(hasher.finalize().into())
}

fn build_after_graph(
    repo: &Repo,
    source: &CommitInfo,
    target: &CommitInfo,
    merge_commit_hash: ObjectHash,
    is_fast_forward: bool,
    source_ref: &str,
    target_ref: &str,
) -> Result<crate::model::CommitGraph> {
    let mut graph;

    if is_fast_forward {
        graph = build_graph(repo, &[source.hash], 20)?;
        graph.current_tip = Some(source.hash);
    } else {
        graph = crate::model::CommitGraph::default();
        let merge_commit = CommitInfo {
            hash: merge_commit_hash,
            message: format!("Merge branch '{source_ref}' into {target_ref}"),
            author_name: target.author_name.clone(),
            author_email: target.author_email.clone(),
            timestamp: target.timestamp + 1,
            parent_hashes: vec![target.hash, source.hash],
            tree_hash: ObjectHash::zero(),
        };
        graph.add_commit(merge_commit);
        for commit in repo.walk_commits(&[target.hash], &[], Some(15))? {
            graph.add_commit(commit);
        }
        for commit in repo.walk_commits(&[source.hash], &[], Some(15))? {
            graph.add_commit(commit);
        }
        graph.current_tip = Some(merge_commit_hash);
    }

    let target_branch = if target_ref == "HEAD" {
        repo.head_branch().unwrap_or_else(|| "target".to_owned())
    } else {
        target_ref.to_owned()
    };
    graph.current_branch = Some(target_branch.clone());
    graph
        .branch_tips
        .insert(target_branch, graph.current_tip.unwrap());
    graph.branch_tips.insert(source_ref.to_owned(), source.hash);

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{checkout_branch, commit_all, init_repo, set_branch, write_file};

    #[test]
    fn non_fast_forward_merge_synthesizes_a_merge_commit() {
        let (dir, git_repo) = init_repo();
        write_file(dir.path(), "a.txt", "1\n");
        let base = commit_all(&git_repo, "Base", &[]);
        set_branch(&git_repo, "main", base);
        checkout_branch(&git_repo, "main");
        write_file(dir.path(), "b.txt", "main\n");
        let main_tip = commit_all(&git_repo, "MainTip", &[base]);
        set_branch(&git_repo, "main", main_tip);

        set_branch(&git_repo, "feature", base);
        checkout_branch(&git_repo, "feature");
        write_file(dir.path(), "c.txt", "feature\n");
        let feature_tip = commit_all(&git_repo, "FeatureTip", &[base]);

        checkout_branch(&git_repo, "main");
        let repo = Repo::open(dir.path()).expect("open repo");
        let (record, _warnings) = MergeSimulator::new("feature", "main", false)
            .run(&repo)
            .expect("merge should validate");

        assert!(!record.is_fast_forward);
        assert_ne!(record.merge_commit_hash.to_string(), feature_tip.to_string());
        assert_ne!(record.merge_commit_hash.to_string(), main_tip.to_string());
        assert!(record.files_merged_cleanly.contains(&std::path::PathBuf::from("b.txt")));
        assert!(record.files_merged_cleanly.contains(&std::path::PathBuf::from("c.txt")));
    }

    #[test]
    fn no_ff_forces_a_merge_commit_even_when_fast_forward_is_possible() {
        let (dir, git_repo) = init_repo();
        write_file(dir.path(), "a.txt", "1\n");
        let base = commit_all(&git_repo, "Base", &[]);
        set_branch(&git_repo, "main", base);

        set_branch(&git_repo, "feature", base);
        checkout_branch(&git_repo, "feature");
        write_file(dir.path(), "b.txt", "feature\n");
        let feature_tip = commit_all(&git_repo, "FeatureTip", &[base]);

        checkout_branch(&git_repo, "main");
        let repo = Repo::open(dir.path()).expect("open repo");
        let (record, _warnings) = MergeSimulator::new("feature", "main", true)
            .run(&repo)
            .expect("merge should validate");

        assert!(!record.is_fast_forward);
        assert_ne!(record.merge_commit_hash.to_string(), feature_tip.to_string());
    }
}

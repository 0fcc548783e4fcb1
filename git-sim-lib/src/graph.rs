//! Assembles a [`CommitGraph`] projection reachable from a set of refs, for
//! before/after display around a simulated operation.

use tracing::instrument;

use crate::error::Result;
use crate::model::{CommitGraph, ObjectHash};
use crate::repo::Repo;

/// Build a graph of commits reachable from `refs` (already-resolved
/// hashes), capped at `max_commits`, annotated with the repository's
/// current tip/branch and with every branch whose name or tip hash appears
/// in `refs`.
#[instrument(skip(repo, refs))]
pub fn build_graph(repo: &Repo, refs: &[ObjectHash], max_commits: usize) -> Result<CommitGraph> {
    let mut graph = CommitGraph::default();
    let commits = repo.walk_commits(refs, &[], Some(max_commits))?;
    for commit in commits {
        graph.add_commit(commit);
    }
    if let Ok(current) = repo.get_commit("HEAD") {
        graph.current_tip = Some(current.hash);
    }
    graph.current_branch = repo.head_branch();
    if let Some(branch) = &graph.current_branch {
        if let Some(tip) = graph.current_tip {
            graph.branch_tips.insert(branch.clone(), tip);
        }
    }
    for branch in repo.list_branches()? {
        if refs.contains(&branch.tip) {
            graph.branch_tips.insert(branch.name, branch.tip);
        }
    }
    Ok(graph)
}

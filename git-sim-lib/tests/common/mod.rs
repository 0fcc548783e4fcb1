//! Shared fixture helpers for the scenario tests: builds small real
//! repositories on disk with `git2` directly (no shelling out to `git`),
//! mirroring the scenarios from the test suite's literal examples.

use std::fs;
use std::path::Path;

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

pub fn init_repo() -> (TempDir, Repository) {
    let dir = tempfile::tempdir().expect("create tempdir");
    let repo = Repository::init(dir.path()).expect("init repo");
    (dir, repo)
}

pub fn write_file(repo_path: &Path, name: &str, content: &str) {
    fs::write(repo_path.join(name), content).expect("write fixture file");
}

pub fn remove_file(repo_path: &Path, name: &str) {
    fs::remove_file(repo_path.join(name)).expect("remove fixture file");
}

fn signature() -> Signature<'static> {
    Signature::now("Testy McTestface", "test@example.com").expect("build signature")
}

/// Stage every file under the working directory and commit, advancing
/// `HEAD`. Returns the new commit's oid.
pub fn commit_all(repo: &Repository, message: &str, parents: &[Oid]) -> Oid {
    let mut index = repo.index().expect("open index");
    index
        .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
        .expect("stage working tree");
    // `add_all` only stages new/modified files; `update_all` also removes
    // entries for files deleted from the working tree since the last commit.
    index
        .update_all(["*"], None)
        .expect("stage working-tree deletions");
    index.write().expect("write index");
    let tree_oid = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_oid).expect("find tree");
    let sig = signature();

    let parent_commits: Vec<_> = parents
        .iter()
        .map(|oid| repo.find_commit(*oid).expect("find parent commit"))
        .collect();
    let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .expect("create commit")
}

pub fn set_branch(repo: &Repository, name: &str, oid: Oid) {
    let commit = repo.find_commit(oid).expect("find commit for branch");
    repo.branch(name, &commit, true).expect("create/update branch");
}

pub fn checkout_branch(repo: &Repository, name: &str) {
    let refname = format!("refs/heads/{name}");
    repo.set_head(&refname).expect("set HEAD to branch");
    let commit = repo
        .find_branch(name, git2::BranchType::Local)
        .expect("find branch")
        .get()
        .peel_to_commit()
        .expect("peel to commit");
    repo.reset(commit.as_object(), git2::ResetType::Hard, None)
        .expect("reset working tree to branch tip");
}

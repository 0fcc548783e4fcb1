//! End-to-end scenario tests against real on-disk repositories, mirroring
//! the literal examples in the test suite the core was built against.

mod common;

use git_sim_lib::model::{ChangeKind, ConflictSeverity, DangerLevel, ResetMode};
use git_sim_lib::repo::Repo;
use git_sim_lib::simulate::{
    CherryPickSimulator, MergeSimulator, RebaseSimulator, ResetSimulator, Simulator,
};

use common::{checkout_branch, commit_all, init_repo, remove_file, set_branch, write_file};

#[test]
fn disjoint_edits_rebase_cleanly() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "initial.txt", "hello\n");
    let initial = commit_all(&git_repo, "Initial", &[]);

    write_file(
        dir.path(),
        "file_a.txt",
        "Content A\nLine 2\nLine 3\n",
    );
    let add_a = commit_all(&git_repo, "AddA", &[initial]);

    write_file(dir.path(), "file_b.txt", "Content B\n");
    let add_b = commit_all(&git_repo, "AddB", &[add_a]);

    set_branch(&git_repo, "main", add_b);
    set_branch(&git_repo, "feature", add_b);
    checkout_branch(&git_repo, "feature");
    write_file(dir.path(), "feature.txt", "Feature content\n");
    commit_all(&git_repo, "AddFeature", &[add_b]);

    checkout_branch(&git_repo, "main");
    write_file(
        dir.path(),
        "README.md",
        "# Test Repo\n\nUpdated readme.\n",
    );
    commit_all(&git_repo, "UpdateReadme", &[add_b]);

    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = RebaseSimulator::new("feature", "main")
        .run(&repo)
        .expect("rebase should validate cleanly");

    assert_eq!(record.steps.len(), 1);
    assert!(!record.steps[0].skipped);
    assert!(record.steps[0].conflicts.is_empty());
}

#[test]
fn same_line_edits_are_a_certain_conflict() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "file_a.txt", "Original\nLine 2\nLine 3\n");
    let base = commit_all(&git_repo, "Initial", &[]);

    set_branch(&git_repo, "branch-a", base);
    checkout_branch(&git_repo, "branch-a");
    write_file(
        dir.path(),
        "file_a.txt",
        "Main version\nLine 2\nLine 3\n",
    );
    commit_all(&git_repo, "A", &[base]);

    set_branch(&git_repo, "branch-b", base);
    checkout_branch(&git_repo, "branch-b");
    write_file(
        dir.path(),
        "file_a.txt",
        "Feature version\nLine 2\nLine 3\n",
    );
    commit_all(&git_repo, "B", &[base]);

    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = RebaseSimulator::new("branch-b", "branch-a")
        .run(&repo)
        .expect("rebase should validate");

    assert_eq!(record.steps.len(), 1);
    let conflicts = &record.steps[0].conflicts;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, ConflictSeverity::Certain);
    assert_eq!(conflicts[0].path, std::path::PathBuf::from("file_a.txt"));
}

#[test]
fn duplicate_patch_is_skipped() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "file_b.txt", "Content B\n");
    let base = commit_all(&git_repo, "Initial", &[]);

    set_branch(&git_repo, "main", base);
    checkout_branch(&git_repo, "main");
    write_file(dir.path(), "file_b.txt", "Content B\nNew\n");
    let main_tip = commit_all(&git_repo, "X'", &[base]);
    set_branch(&git_repo, "main", main_tip);

    set_branch(&git_repo, "feature", base);
    checkout_branch(&git_repo, "feature");
    write_file(dir.path(), "file_b.txt", "Content B\nNew\n");
    commit_all(&git_repo, "X", &[base]);

    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = RebaseSimulator::new("feature", "main")
        .run(&repo)
        .expect("rebase should validate");

    assert_eq!(record.steps.len(), 1);
    assert!(record.steps[0].skipped);
    assert!(record.steps[0].new_hash.is_none());
}

#[test]
fn delete_modify_is_a_certain_conflict() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "file_a.txt", "Content\n");
    let base = commit_all(&git_repo, "Initial", &[]);

    set_branch(&git_repo, "main", base);
    checkout_branch(&git_repo, "main");
    remove_file(dir.path(), "file_a.txt");
    let main_tip = commit_all(&git_repo, "DeleteFileA", &[base]);
    set_branch(&git_repo, "main", main_tip);

    set_branch(&git_repo, "feature", base);
    checkout_branch(&git_repo, "feature");
    write_file(dir.path(), "file_a.txt", "Modified content\n");
    commit_all(&git_repo, "ModifyFileA", &[base]);

    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = RebaseSimulator::new("feature", "main")
        .run(&repo)
        .expect("rebase should validate");

    assert_eq!(record.steps.len(), 1);
    let conflicts = &record.steps[0].conflicts;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, ConflictSeverity::Certain);
    assert!(conflicts[0].description.contains("deleted"));
    assert!(conflicts[0].description.contains("modified"));
}

#[test]
fn merge_fast_forwards_when_possible() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "initial.txt", "hello\n");
    let base = commit_all(&git_repo, "Initial", &[]);
    set_branch(&git_repo, "main", base);

    set_branch(&git_repo, "feature", base);
    checkout_branch(&git_repo, "feature");
    write_file(dir.path(), "feature.txt", "Feature content\n");
    let feature_tip = commit_all(&git_repo, "AddFeature", &[base]);

    checkout_branch(&git_repo, "main");
    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = MergeSimulator::new("feature", "main", false)
        .run(&repo)
        .expect("merge should validate");

    assert!(record.is_fast_forward);
    assert_eq!(record.merge_commit_hash.to_string(), feature_tip.to_string());
    assert_eq!(
        record.after_graph.current_tip.map(|h| h.to_string()),
        Some(feature_tip.to_string())
    );
}

#[test]
fn hard_reset_detaches_reachable_commits() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "a.txt", "1\n");
    let c1 = commit_all(&git_repo, "C1", &[]);
    write_file(dir.path(), "b.txt", "2\n");
    let c2 = commit_all(&git_repo, "C2", &[c1]);
    write_file(dir.path(), "c.txt", "3\n");
    let c3 = commit_all(&git_repo, "C3", &[c2]);
    set_branch(&git_repo, "main", c3);
    checkout_branch(&git_repo, "main");

    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = ResetSimulator::new(c1.to_string(), ResetMode::Hard)
        .run(&repo)
        .expect("reset should validate");

    let detached: Vec<String> = record
        .commits_detached
        .iter()
        .map(|c| c.hash.to_string())
        .collect();
    assert_eq!(detached, vec![c3.to_string(), c2.to_string()]);
    assert!(record.files_discarded.contains(&std::path::PathBuf::from("b.txt")));
    assert!(record.files_discarded.contains(&std::path::PathBuf::from("c.txt")));

    let result = record.into_uniform_result();
    let safety = result.safety_info.expect("reset always annotates safety");
    assert_eq!(safety.danger_level, DangerLevel::High);
    assert!(!safety.reversible);
}

#[test]
fn root_commit_change_kind_is_add_like() {
    // sanity check that the fixture helper produces a well-formed root commit
    let (dir, git_repo) = init_repo();
    write_file(dir.path(), "only.txt", "content\n");
    let root = commit_all(&git_repo, "Root", &[]);
    set_branch(&git_repo, "main", root);

    let repo = Repo::open(dir.path()).expect("open repo");
    let commit = repo.get_commit("main").expect("resolve main");
    let changes = repo
        .get_commit_changes(commit.hash)
        .expect("diff root commit against empty tree");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Add);
}

#[test]
fn cherry_pick_applies_cleanly_onto_target() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "initial.txt", "hello\n");
    let base = commit_all(&git_repo, "Initial", &[]);
    set_branch(&git_repo, "main", base);
    checkout_branch(&git_repo, "main");
    write_file(dir.path(), "README.md", "# Test Repo\n");
    let main_tip = commit_all(&git_repo, "UpdateReadme", &[base]);
    set_branch(&git_repo, "main", main_tip);

    set_branch(&git_repo, "feature", base);
    checkout_branch(&git_repo, "feature");
    write_file(dir.path(), "feature.txt", "Feature content\n");
    let pick = commit_all(&git_repo, "AddFeature", &[base]);

    checkout_branch(&git_repo, "main");
    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = CherryPickSimulator::new(vec![pick.to_string()], "main")
        .run(&repo)
        .expect("cherry-pick should validate");

    assert_eq!(record.steps.len(), 1);
    assert!(!record.steps[0].skipped);
    assert!(record.steps[0].conflicts.is_empty());
    assert_eq!(record.steps[0].commit.hash.to_string(), pick.to_string());
}

#[test]
fn cherry_pick_of_already_applied_patch_produces_no_conflict() {
    let (dir, git_repo) = init_repo();

    write_file(dir.path(), "initial.txt", "hello\n");
    let base = commit_all(&git_repo, "Initial", &[]);

    set_branch(&git_repo, "main", base);
    checkout_branch(&git_repo, "main");
    write_file(dir.path(), "shared.txt", "identical content\n");
    let main_tip = commit_all(&git_repo, "AddSharedOnMain", &[base]);
    set_branch(&git_repo, "main", main_tip);

    set_branch(&git_repo, "feature", base);
    checkout_branch(&git_repo, "feature");
    write_file(dir.path(), "shared.txt", "identical content\n");
    let pick = commit_all(&git_repo, "AddSharedOnFeature", &[base]);

    checkout_branch(&git_repo, "main");
    let repo = Repo::open(dir.path()).expect("open repo");
    let (record, _warnings) = CherryPickSimulator::new(vec![pick.to_string()], "main")
        .run(&repo)
        .expect("cherry-pick should validate");

    assert_eq!(record.steps.len(), 1);
    assert!(record.steps[0].conflicts.is_empty());
}

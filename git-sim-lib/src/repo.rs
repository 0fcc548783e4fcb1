//! The repository facade: ref resolution, commit walking, merge-base, and
//! tree diffing. This is the only module that touches `git2` directly for
//! object-store access; every other component sees [`ObjectHash`] and
//! [`CommitInfo`] values.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::model::{BranchInfo, CommitInfo, FileChange, ObjectHash};

/// A handle onto a read-only view of a Git object store.
///
/// `Repo` is cheap to construct and holds the underlying `git2::Repository`
/// for its lifetime; each simulation opens its own facade rather than
/// sharing one across concurrent simulations (see the concurrency model).
pub struct Repo {
    inner: git2::Repository,
}

/// The narrow capability the diff analyzer needs from the facade: "yield
/// commits in a range" plus "the patch-id of one commit". Breaks the cycle
/// noted in the design notes without a concrete dependency from the
/// analyzer on [`Repo`] itself.
pub trait CommitRange {
    /// Commits reachable from `include` but not from `exclude`, topo order.
    fn commits_in_range(
        &self,
        include: &[ObjectHash],
        exclude: &[ObjectHash],
        max_entries: Option<usize>,
    ) -> Result<Vec<CommitInfo>>;

    /// The patch-id of a single already-resolved commit.
    fn patch_id_for(&self, hash: ObjectHash) -> Result<ObjectHash>;
}

impl Repo {
    /// Open the repository at `path` (or any of its parent directories, per
    /// normal Git discovery).
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = git2::Repository::discover(path).map_err(|_| Error::NotARepository {
            path: path.display().to_string(),
        })?;
        Ok(Repo { inner })
    }

    /// The branch HEAD currently points to, or `None` if detached.
    #[instrument(skip(self))]
    pub fn head_branch(&self) -> Option<String> {
        let head = self.inner.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_owned)
    }

    /// Resolve a ref string to a commit hash, per the five-step order: exact
    /// hex, short-hex prefix, `refs/heads|tags|remotes/<name>`, `HEAD`,
    /// relative `~N`/`^N` suffixes on `HEAD`.
    #[instrument(skip(self))]
    pub fn resolve_ref(&self, reference: &str) -> Result<ObjectHash> {
        if let Some(hash) = self.try_exact_hex(reference)? {
            return Ok(hash);
        }
        if reference.len() >= 7 && reference.chars().all(|c| c.is_ascii_hexdigit()) {
            if let Some(hash) = self.try_short_prefix(reference)? {
                return Ok(hash);
            }
        }
        for prefix in ["refs/heads/", "refs/tags/", "refs/remotes/"] {
            let candidate = format!("{prefix}{reference}");
            if let Ok(ref_obj) = self.inner.find_reference(&candidate) {
                if let Some(hash) = self.reference_to_commit_hash(&ref_obj) {
                    return Ok(hash);
                }
            }
        }
        if reference == "HEAD" {
            return self.resolve_head();
        }
        if let Some(rest) = reference.strip_prefix("HEAD") {
            if !rest.is_empty() {
                return self.resolve_relative(rest);
            }
        }
        debug!(reference, "ref did not resolve");
        Err(Error::RefNotFound {
            reference: reference.to_owned(),
        })
    }

    fn try_exact_hex(&self, reference: &str) -> Result<Option<ObjectHash>> {
        if reference.len() != 40 || !reference.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        let oid = git2::Oid::from_str(reference)?;
        match self.inner.find_commit(oid) {
            Ok(commit) => Ok(Some(ObjectHash::from_oid(commit.id()))),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn try_short_prefix(&self, prefix: &str) -> Result<Option<ObjectHash>> {
        let odb = self.inner.odb()?;
        let mut matches = Vec::new();
        odb.foreach(|oid| {
            if oid.to_string().starts_with(prefix) && self.inner.find_commit(*oid).is_ok() {
                matches.push(*oid);
            }
            true
        })?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(ObjectHash::from_oid(matches[0]))),
            count => Err(Error::AmbiguousRef {
                reference: prefix.to_owned(),
                count,
            }),
        }
    }

    fn resolve_head(&self) -> Result<ObjectHash> {
        let head = self
            .inner
            .head()
            .map_err(|_| Error::RefNotFound {
                reference: "HEAD".to_owned(),
            })?
            .peel_to_commit()
            .map_err(|_| Error::RefNotFound {
                reference: "HEAD".to_owned(),
            })?;
        Ok(ObjectHash::from_oid(head.id()))
    }

    fn reference_to_commit_hash(&self, reference: &git2::Reference) -> Option<ObjectHash> {
        reference
            .peel_to_commit()
            .ok()
            .map(|c| ObjectHash::from_oid(c.id()))
    }

    /// Parse and apply a `~N`/`^N` suffix (already known to start with `~`
    /// or `^`) onto `HEAD`, left to right.
    fn resolve_relative(&self, suffix: &str) -> Result<ObjectHash> {
        let head = self.resolve_head()?;
        let mut commit = self.find_git2_commit(head)?;
        let mut chars = suffix.chars().peekable();
        while let Some(marker) = chars.next() {
            let mut digits = String::new();
            while let Some(c) = chars.peek() {
                if c.is_ascii_digit() {
                    digits.push(*c);
                    chars.next();
                } else {
                    break;
                }
            }
            let n: usize = if digits.is_empty() {
                1
            } else {
                digits.parse().unwrap_or(1)
            };
            commit = match marker {
                '~' => self.walk_first_parent(commit, n)?,
                '^' => self.nth_parent(commit, n)?,
                _ => {
                    return Err(Error::RefNotFound {
                        reference: format!("HEAD{suffix}"),
                    })
                }
            };
        }
        Ok(ObjectHash::from_oid(commit.id()))
    }

    fn walk_first_parent<'a>(
        &'a self,
        mut commit: git2::Commit<'a>,
        n: usize,
    ) -> Result<git2::Commit<'a>> {
        for _ in 0..n {
            commit = commit.parent(0).map_err(|_| Error::RefNotFound {
                reference: format!("{}~", commit.id()),
            })?;
        }
        Ok(commit)
    }

    fn nth_parent<'a>(&'a self, commit: git2::Commit<'a>, n: usize) -> Result<git2::Commit<'a>> {
        if n == 0 {
            return Ok(commit);
        }
        commit.parent(n - 1).map_err(|_| Error::RefNotFound {
            reference: format!("{}^{}", commit.id(), n),
        })
    }

    fn find_git2_commit(&self, hash: ObjectHash) -> Result<git2::Commit<'_>> {
        self.inner
            .find_commit(hash.as_oid())
            .map_err(|_| Error::NotACommit {
                oid: hash.to_string(),
            })
    }

    /// Resolve `reference` and fetch the full commit record.
    #[instrument(skip(self))]
    pub fn get_commit(&self, reference: &str) -> Result<CommitInfo> {
        let hash = self.resolve_ref(reference)?;
        self.find_commit(hash)
    }

    /// Fetch the commit record for an already-resolved hash.
    #[instrument(skip(self))]
    pub fn find_commit(&self, hash: ObjectHash) -> Result<CommitInfo> {
        let commit = self.find_git2_commit(hash)?;
        Ok(commit_info_from_git2(&commit))
    }

    /// Walk commits reachable from `include` but not `exclude`, oldest
    /// excluded, newest included, topological order (children before
    /// parents), ties broken by descending timestamp then hash.
    #[instrument(skip(self))]
    pub fn walk_commits(
        &self,
        include: &[ObjectHash],
        exclude: &[ObjectHash],
        max_entries: Option<usize>,
    ) -> Result<Vec<CommitInfo>> {
        let mut walk = self.inner.revwalk()?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        for hash in include {
            walk.push(hash.as_oid())?;
        }
        for hash in exclude {
            walk.hide(hash.as_oid())?;
        }
        let mut out = Vec::new();
        for oid in walk {
            let oid = oid?;
            let commit = self.inner.find_commit(oid)?;
            out.push(commit_info_from_git2(&commit));
            if let Some(max) = max_entries {
                if out.len() >= max {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// The nearest common ancestor of `a` and `b`: materialize `a`'s
    /// ancestor closure, then DFS `b`'s ancestors and return the first
    /// member found in the closure. `None` if there is no common ancestor.
    #[instrument(skip(self))]
    pub fn find_merge_base(&self, a: ObjectHash, b: ObjectHash) -> Result<Option<ObjectHash>> {
        let closure = self.ancestor_closure(a)?;
        if closure.contains(&b) {
            return Ok(Some(b));
        }
        let mut stack = vec![b];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if closure.contains(&current) {
                return Ok(Some(current));
            }
            let commit = self.find_git2_commit(current)?;
            for parent in commit.parent_ids() {
                stack.push(ObjectHash::from_oid(parent));
            }
        }
        Ok(None)
    }

    fn ancestor_closure(&self, start: ObjectHash) -> Result<HashSet<ObjectHash>> {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let commit = self.find_git2_commit(current)?;
            for parent in commit.parent_ids() {
                stack.push(ObjectHash::from_oid(parent));
            }
        }
        Ok(seen)
    }

    /// All file changes for `commit`, diffed against its first parent (or
    /// the empty tree, for a root commit).
    #[instrument(skip(self))]
    pub fn get_commit_changes(&self, hash: ObjectHash) -> Result<Vec<FileChange>> {
        let commit = self.find_git2_commit(hash)?;
        let new_tree = commit.tree()?;
        let old_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        self.diff_trees(old_tree.as_ref(), &new_tree)
    }

    /// Diff two trees into structured file-change records, parsing the
    /// tree differ's unified-diff text via [`crate::diff`].
    #[instrument(skip(self, old_tree, new_tree))]
    pub fn diff_trees(
        &self,
        old_tree: Option<&git2::Tree>,
        new_tree: &git2::Tree,
    ) -> Result<Vec<FileChange>> {
        let text = self.diff_text(old_tree, new_tree)?;
        Ok(crate::diff::parse_unified_diff(&text))
    }

    /// The raw unified-diff text the object-store differ produces for two
    /// trees, in the exact grammar the diff analyzer parses.
    ///
    /// Requests full 40-hex `index` lines (libgit2 defaults to an abbreviated
    /// hex width): [`crate::diff::parse_unified_diff`] feeds whatever comes
    /// back straight into [`ObjectHash::from_str`], which only accepts a full
    /// hash, so an abbreviated blob id would silently parse to `None` and
    /// break same-content ADD/ADD detection in the conflict detector.
    #[instrument(skip(self, old_tree, new_tree))]
    pub fn diff_text(
        &self,
        old_tree: Option<&git2::Tree>,
        new_tree: &git2::Tree,
    ) -> Result<String> {
        let mut opts = git2::DiffOptions::new();
        opts.id_abbrev(40);
        let diff = self
            .inner
            .diff_tree_to_tree(old_tree, Some(new_tree), Some(&mut opts))?;
        let mut text = Vec::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => text.push(line.origin() as u8),
                _ => {}
            }
            text.extend_from_slice(line.content());
            true
        })?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// Compute the patch-id for a commit: the normalized hash of its diff
    /// against its first parent, or a hash derived from the commit's own
    /// hash for a root commit (see [`crate::diff::patch_id_for_commit`]).
    #[instrument(skip(self))]
    pub fn get_patch_id(&self, hash: ObjectHash) -> Result<ObjectHash> {
        let commit = self.find_git2_commit(hash)?;
        if let Ok(parent) = commit.parent(0) {
            let diff_text = self.diff_text(Some(&parent.tree()?), &commit.tree()?)?;
            Ok(crate::diff::patch_id_from_diff(&diff_text))
        } else {
            Ok(crate::diff::patch_id_from_root_commit(hash))
        }
    }

    /// Collect the set of patch-ids for every commit in `include` (exclusive
    /// of `exclude`). Delegates to [`crate::diff::collect_patch_ids`], which
    /// only sees this facade through the [`CommitRange`] seam.
    #[instrument(skip(self))]
    pub fn collect_patch_ids(
        &self,
        include: &[ObjectHash],
        exclude: &[ObjectHash],
    ) -> Result<HashSet<ObjectHash>> {
        crate::diff::collect_patch_ids(self, include, exclude)
    }

    /// File changes for every commit in `include` (exclusive of `exclude`),
    /// concatenated in walk order.
    #[instrument(skip(self))]
    pub fn collect_changes(
        &self,
        include: &[ObjectHash],
        exclude: &[ObjectHash],
    ) -> Result<Vec<FileChange>> {
        let commits = self.walk_commits(include, exclude, None)?;
        let mut all = Vec::new();
        for commit in commits {
            all.extend(self.get_commit_changes(commit.hash)?);
        }
        Ok(all)
    }

    /// Enumerate local and remote-tracking branches. Used by the graph
    /// builder to annotate branch tips; branches whose commit cannot be
    /// peeled (a dangling or malformed ref) are silently skipped rather than
    /// failing the whole enumeration.
    #[instrument(skip(self))]
    pub fn list_branches(&self) -> Result<Vec<BranchInfo>> {
        let mut out = Vec::new();
        for branch_type in [git2::BranchType::Local, git2::BranchType::Remote] {
            for branch in self.inner.branches(Some(branch_type))? {
                let (branch, _) = branch?;
                let Some(name) = branch.name()? else {
                    continue;
                };
                let Some(tip) = branch
                    .get()
                    .peel_to_commit()
                    .ok()
                    .map(|c| ObjectHash::from_oid(c.id()))
                else {
                    continue;
                };
                out.push(BranchInfo {
                    name: name.to_owned(),
                    tip,
                    is_remote: branch_type == git2::BranchType::Remote,
                });
            }
        }
        Ok(out)
    }

    /// Diff the trees of two arbitrary commits directly, rather than a
    /// commit against its parent. Used by reset to compare the current tip
    /// against the reset target.
    #[instrument(skip(self))]
    pub fn diff_commits(&self, old: ObjectHash, new: ObjectHash) -> Result<Vec<FileChange>> {
        let old_tree = self.find_git2_commit(old)?.tree()?;
        let new_tree = self.find_git2_commit(new)?.tree()?;
        self.diff_trees(Some(&old_tree), &new_tree)
    }
}

impl CommitRange for Repo {
    fn commits_in_range(
        &self,
        include: &[ObjectHash],
        exclude: &[ObjectHash],
        max_entries: Option<usize>,
    ) -> Result<Vec<CommitInfo>> {
        self.walk_commits(include, exclude, max_entries)
    }

    fn patch_id_for(&self, hash: ObjectHash) -> Result<ObjectHash> {
        self.get_patch_id(hash)
    }
}

fn commit_info_from_git2(commit: &git2::Commit) -> CommitInfo {
    let author = commit.author();
    CommitInfo {
        hash: ObjectHash::from_oid(commit.id()),
        message: commit.message().unwrap_or("").to_owned(),
        author_name: author.name().unwrap_or("").to_owned(),
        author_email: author.email().unwrap_or("").to_owned(),
        timestamp: commit.time().seconds(),
        parent_hashes: commit.parent_ids().map(ObjectHash::from_oid).collect(),
        tree_hash: ObjectHash::from_oid(commit.tree_id()),
    }
}

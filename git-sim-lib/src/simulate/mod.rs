//! The four operation simulators. Each implements [`Simulator`] directly
//! (no trait object, no virtual dispatch — the set of simulators is
//! closed, and the dispatcher matches a tagged enum over them).

mod cherry_pick;
mod merge;
mod rebase;
mod reset;

pub use cherry_pick::CherryPickSimulator;
pub use merge::MergeSimulator;
pub use rebase::RebaseSimulator;
pub use reset::ResetSimulator;

use crate::error::{Error, SimError};
use crate::repo::Repo;

/// Shared validate-then-simulate shape every operation simulator follows.
/// Generic, not `dyn` — each call site is monomorphized to a concrete
/// simulator type.
pub trait Simulator {
    /// The operation-specific record this simulator produces.
    type Output;

    /// Check preconditions. Returns `(errors, warnings)`; a non-empty
    /// `errors` means [`Simulator::run`] will fail without calling
    /// [`Simulator::simulate`].
    fn validate(&self, repo: &Repo) -> Result<(Vec<String>, Vec<String>), Error>;

    /// Produce the simulation record. Only called after [`Simulator::run`]
    /// confirms `validate` raised no errors.
    fn simulate(&self, repo: &Repo) -> Result<Self::Output, Error>;

    /// Validate, then simulate. Returns the warnings alongside the output so
    /// the dispatcher can attach them to the uniform result.
    fn run(&self, repo: &Repo) -> Result<(Self::Output, Vec<String>), SimError> {
        let (errors, warnings) = self.validate(repo)?;
        if !errors.is_empty() {
            return Err(SimError::ValidationFailed { messages: errors });
        }
        let output = self.simulate(repo)?;
        Ok((output, warnings))
    }
}

/// Hash `(original_hash, onto_or_target_hash, step_index)` into a synthetic
/// commit hash for display. Never collides with a real object-store hash in
/// practice (the step index is folded into the digest); valid only within
/// one uniform result.
pub(crate) fn synthesize_hash(
    original: crate::model::ObjectHash,
    onto_or_target: crate::model::ObjectHash,
    step_index: usize,
) -> crate::model::ObjectHash {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(original.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(onto_or_target.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(step_index.to_string().as_bytes());
    crate::model::ObjectHash::from_digest(hasher.finalize().into())
}

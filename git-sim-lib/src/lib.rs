//! Read-only simulation engine for destructive Git history-rewriting
//! operations: rebase, merge, reset, cherry-pick.
//!
//! Every simulator here predicts the effect of an operation against a real
//! repository without mutating refs, the index, or the working tree. The
//! repository is opened once per simulation and only ever read.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::as_conversions, clippy::clone_on_ref_ptr)]
#![allow(clippy::too_many_arguments)]

pub mod conflict;
pub mod diff;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod model;
pub mod repo;
pub mod simulate;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{DispatchError, Error, Result, SimError};
pub use model::*;
pub use repo::Repo;

//! Error taxonomy for the simulation engine.
//!
//! Each failable component gets its own `thiserror` enum; [`SimError`]
//! aggregates them so a caller that doesn't care which component failed can
//! use a single `Result<T, SimError>`.

use thiserror::Error;

/// Errors raised by the repository facade.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a git repository: {path}")]
    NotARepository { path: String },

    #[error("reference not found: {reference}")]
    RefNotFound { reference: String },

    #[error("reference {reference} is ambiguous ({count} commits match prefix)")]
    AmbiguousRef { reference: String, count: usize },

    #[error("object {oid} is not a commit")]
    NotACommit { oid: String },

    #[error(transparent)]
    Git(#[from] git2::Error),
}

/// Result alias for repository-facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing a Git-style command string.
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("empty command string")]
    EmptyCommand,

    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("{command} requires {argument}")]
    MissingArgument { command: String, argument: String },
}

/// Crate-level aggregate error. Callers that want to propagate any failure
/// from the engine with `?` without matching on which component raised it
/// can use this; components that care about the precise failure mode match
/// on [`Error`] or [`DispatchError`] directly.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Repo(#[from] Error),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("validation failed: {}", .messages.join("; "))]
    ValidationFailed { messages: Vec<String> },
}

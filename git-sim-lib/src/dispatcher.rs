//! Parses a Git-style command string and routes it to one of the four
//! simulators (§4.8). The simulator set is closed, so this matches a tagged
//! enum rather than dispatching through a trait object.

use tracing::instrument;

use crate::error::{DispatchError, SimError};
use crate::model::{DangerLevel, ResetMode, SafetyInfo, UniformResult};
use crate::repo::Repo;
use crate::simulate::{CherryPickSimulator, MergeSimulator, RebaseSimulator, ResetSimulator, Simulator};

/// A parsed, ready-to-run simulation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Rebase {
        source: String,
        onto: String,
    },
    Merge {
        source: String,
        target: String,
        no_ff: bool,
    },
    Reset {
        target: String,
        mode: ResetMode,
    },
    CherryPick {
        commits: Vec<String>,
        target: String,
    },
}

/// Parse a Git-style command string, e.g. `"rebase --onto main feature"` or
/// `"cherry-pick abc123 def456"`. Positional, with a small recognized flag
/// set per command; unrecognized flags are silently skipped (reserved for
/// forward compatibility).
#[instrument]
pub fn parse_command(input: &str) -> Result<Command, DispatchError> {
    let mut tokens = input.split_whitespace();
    let command = tokens.next().ok_or(DispatchError::EmptyCommand)?;
    let rest: Vec<&str> = tokens.collect();

    match command {
        "rebase" => parse_rebase(&rest),
        "merge" => parse_merge(&rest),
        "reset" => parse_reset(&rest),
        "cherry-pick" | "cherrypick" => parse_cherry_pick(&rest),
        other => Err(DispatchError::UnknownCommand {
            command: other.to_owned(),
        }),
    }
}

fn parse_rebase(args: &[&str]) -> Result<Command, DispatchError> {
    let mut onto = None;
    let mut source = "HEAD".to_owned();
    let mut positional = None;
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--onto" | "-o" => {
                onto = Some(take_value(args, &mut i, "rebase", "--onto")?);
            }
            "--source" | "-s" => {
                source = take_value(args, &mut i, "rebase", "--source")?;
            }
            other if !other.starts_with('-') && positional.is_none() => {
                positional = Some(other.to_owned());
                i += 1;
            }
            _ => i += 1,
        }
    }
    let onto = onto.or(positional).ok_or(DispatchError::MissingArgument {
        command: "rebase".to_owned(),
        argument: "onto".to_owned(),
    })?;
    Ok(Command::Rebase { source, onto })
}

fn parse_merge(args: &[&str]) -> Result<Command, DispatchError> {
    let mut source = None;
    let mut no_ff = false;
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--no-ff" => {
                no_ff = true;
                i += 1;
            }
            other if !other.starts_with('-') && source.is_none() => {
                source = Some(other.to_owned());
                i += 1;
            }
            _ => i += 1,
        }
    }
    let source = source.ok_or(DispatchError::MissingArgument {
        command: "merge".to_owned(),
        argument: "source".to_owned(),
    })?;
    Ok(Command::Merge {
        source,
        target: "HEAD".to_owned(),
        no_ff,
    })
}

fn parse_reset(args: &[&str]) -> Result<Command, DispatchError> {
    let mut mode = ResetMode::Mixed;
    let mut target = None;
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "--hard" => {
                mode = ResetMode::Hard;
                i += 1;
            }
            "--soft" => {
                mode = ResetMode::Soft;
                i += 1;
            }
            "--mixed" => {
                mode = ResetMode::Mixed;
                i += 1;
            }
            other if !other.starts_with('-') && target.is_none() => {
                target = Some(other.to_owned());
                i += 1;
            }
            _ => i += 1,
        }
    }
    let target = target.ok_or(DispatchError::MissingArgument {
        command: "reset".to_owned(),
        argument: "target".to_owned(),
    })?;
    Ok(Command::Reset { target, mode })
}

fn parse_cherry_pick(args: &[&str]) -> Result<Command, DispatchError> {
    let commits: Vec<String> = args
        .iter()
        .filter(|a| !a.starts_with('-'))
        .map(|a| a.to_string())
        .collect();
    if commits.is_empty() {
        return Err(DispatchError::MissingArgument {
            command: "cherry-pick".to_owned(),
            argument: "commit".to_owned(),
        });
    }
    Ok(Command::CherryPick {
        commits,
        target: "HEAD".to_owned(),
    })
}

fn take_value(
    args: &[&str],
    i: &mut usize,
    command: &str,
    flag: &str,
) -> Result<String, DispatchError> {
    let value = args.get(*i + 1).ok_or_else(|| DispatchError::MissingArgument {
        command: command.to_owned(),
        argument: flag.to_owned(),
    })?;
    *i += 2;
    Ok((*value).to_owned())
}

/// Run a parsed command against `repo`, producing a [`UniformResult`]
/// decorated with the per-operation safety record (§4.8).
#[instrument(skip(repo, command))]
pub fn dispatch(repo: &Repo, command: Command) -> Result<UniformResult, SimError> {
    match command {
        Command::Rebase { source, onto } => {
            let (record, warnings) = RebaseSimulator::new(source, onto).run(repo)?;
            let mut result = record.into_uniform_result();
            result.warnings = warnings;
            let has_conflicts = result.conflict_count() > 0;
            result.safety_info = Some(SafetyInfo {
                danger_level: if has_conflicts {
                    DangerLevel::High
                } else {
                    DangerLevel::Medium
                },
                reasons: rebase_reasons(has_conflicts),
                suggestions: vec!["force-push is required after a real rebase".to_owned()],
                reversible: true,
                requires_force_push: true,
            });
            Ok(result)
        }
        Command::Merge {
            source,
            target,
            no_ff,
        } => {
            let (record, warnings) = MergeSimulator::new(source, target, no_ff).run(repo)?;
            let mut result = record.into_uniform_result();
            result.warnings = warnings;
            let has_conflicts = result.conflict_count() > 0;
            result.safety_info = Some(SafetyInfo {
                danger_level: if has_conflicts {
                    DangerLevel::Medium
                } else {
                    DangerLevel::Low
                },
                reasons: merge_reasons(has_conflicts),
                suggestions: Vec::new(),
                reversible: true,
                requires_force_push: false,
            });
            Ok(result)
        }
        Command::Reset { target, mode } => {
            let (record, warnings) = ResetSimulator::new(target, mode).run(repo)?;
            let mut result = record.into_uniform_result();
            result.warnings = warnings;
            Ok(result)
        }
        Command::CherryPick { commits, target } => {
            let (record, warnings) = CherryPickSimulator::new(commits, target).run(repo)?;
            let mut result = record.into_uniform_result();
            result.warnings = warnings;
            let has_conflicts = result.conflict_count() > 0;
            result.safety_info = Some(SafetyInfo {
                danger_level: if has_conflicts {
                    DangerLevel::Medium
                } else {
                    DangerLevel::Low
                },
                reasons: cherry_pick_reasons(has_conflicts),
                suggestions: Vec::new(),
                reversible: true,
                requires_force_push: false,
            });
            Ok(result)
        }
    }
}

fn rebase_reasons(has_conflicts: bool) -> Vec<String> {
    if has_conflicts {
        vec!["predicted conflicts during replay".to_owned()]
    } else {
        vec!["rewrites commit hashes on the source branch".to_owned()]
    }
}

fn merge_reasons(has_conflicts: bool) -> Vec<String> {
    if has_conflicts {
        vec!["predicted conflicts merging the two histories".to_owned()]
    } else {
        Vec::new()
    }
}

fn cherry_pick_reasons(has_conflicts: bool) -> Vec<String> {
    if has_conflicts {
        vec!["predicted conflicts applying one or more patches".to_owned()]
    } else {
        Vec::new()
    }
}

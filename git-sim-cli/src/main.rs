//! Command-line front-end for the read-only Git history-rewriting simulator.
//!
//! Thin by design: argv parsing, a tracing filter, and either a JSON dump or
//! a compact human summary of the uniform result. Commit-graph ASCII art and
//! rich diff tables belong to a richer terminal renderer, not this binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eyre::Context;
use git_sim_lib::dispatcher::{dispatch, Command as DispatchCommand};
use git_sim_lib::model::{ConflictSeverity, ResetMode, UniformResult};
use git_sim_lib::repo::Repo;
use tracing_subscriber::EnvFilter;

/// Predict the effect of a Git history-rewriting operation without touching
/// the repository.
#[derive(Debug, Parser)]
#[command(name = "git-sim", version, about)]
struct Opts {
    /// Path to the repository (defaults to the current directory).
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Print the uniform result as JSON instead of a compact summary.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Exit with a non-zero status if the simulation predicts failure
    /// (certain conflicts).
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Simulate replaying `source` onto `onto`.
    Rebase {
        /// The branch or commit to rebase onto.
        onto: String,
        /// The branch or commit being replayed (defaults to `HEAD`).
        #[arg(long, short = 's', default_value = "HEAD")]
        source: String,
    },
    /// Simulate merging `source` into the current branch.
    Merge {
        /// The branch or commit to merge in.
        source: String,
        /// Force a merge commit even if a fast-forward is possible.
        #[arg(long)]
        no_ff: bool,
    },
    /// Simulate resetting the current branch to `target`.
    Reset {
        /// The commit to reset to.
        target: String,
        /// Move the branch tip only; keep the index and working tree.
        #[arg(long, conflicts_with_all = ["mixed", "hard"])]
        soft: bool,
        /// Move the branch tip and unstage changes (the default).
        #[arg(long, conflicts_with_all = ["soft", "hard"])]
        mixed: bool,
        /// Move the branch tip and discard uncommitted changes.
        #[arg(long, conflicts_with_all = ["soft", "mixed"])]
        hard: bool,
    },
    /// Simulate cherry-picking one or more commits onto the current branch.
    #[command(visible_alias = "cherrypick")]
    CherryPick {
        /// The commits to pick, in order.
        #[arg(required = true)]
        commits: Vec<String>,
    },
}

fn main() -> ExitCode {
    color_eyre::install().expect("could not install panic handler");
    let opts = Opts::parse();
    install_tracing(opts.verbose, opts.quiet);

    match run(&opts) {
        Ok(result) => {
            print_result(&opts, &result);
            if opts.strict && !result.success {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &Opts) -> eyre::Result<UniformResult> {
    let repo = Repo::open(&opts.repo)
        .with_context(|| format!("opening repository at {}", opts.repo.display()))?;
    let command = match &opts.command {
        Commands::Rebase { onto, source } => DispatchCommand::Rebase {
            source: source.clone(),
            onto: onto.clone(),
        },
        Commands::Merge { source, no_ff } => DispatchCommand::Merge {
            source: source.clone(),
            target: "HEAD".to_owned(),
            no_ff: *no_ff,
        },
        Commands::Reset {
            target,
            soft,
            mixed: _,
            hard,
        } => DispatchCommand::Reset {
            target: target.clone(),
            mode: if *soft {
                ResetMode::Soft
            } else if *hard {
                ResetMode::Hard
            } else {
                ResetMode::Mixed
            },
        },
        Commands::CherryPick { commits } => DispatchCommand::CherryPick {
            commits: commits.clone(),
            target: "HEAD".to_owned(),
        },
    };
    let result = dispatch(&repo, command).context("running simulation")?;
    Ok(result)
}

fn print_result(opts: &Opts, result: &UniformResult) {
    if opts.json {
        match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error: could not serialize result: {err}"),
        }
        return;
    }

    println!(
        "{:?}: {} -> {}",
        result.operation, result.source_ref, result.target_ref
    );
    if let Some(new_head) = result.new_head {
        println!("new head: {}", new_head.short());
    }
    if !result.commits_created.is_empty() {
        println!("{} commit(s) created", result.commits_created.len());
    }
    if !result.commits_dropped.is_empty() {
        println!("{} commit(s) dropped", result.commits_dropped.len());
    }
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    for conflict in &result.conflicts {
        let marker = match conflict.severity {
            ConflictSeverity::Certain => "CONFLICT",
            ConflictSeverity::Likely => "possible conflict",
        };
        println!("{marker}: {} ({})", conflict.path.display(), conflict.description);
    }
    if let Some(safety) = &result.safety_info {
        println!(
            "danger: {:?}{}",
            safety.danger_level,
            if safety.requires_force_push {
                " (requires force-push)"
            } else {
                ""
            }
        );
        for reason in &safety.reasons {
            println!("  - {reason}");
        }
    }
    println!(
        "{}",
        if result.success {
            "predicted: clean"
        } else {
            "predicted: conflicts"
        }
    );
}

fn install_tracing(verbose: u8, quiet: u8) {
    let level = match verbose as i16 - quiet as i16 {
        ..=-1 => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

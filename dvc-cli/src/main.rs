//! dvc: a small single-user version control system.
//!
//! # Usage
//!
//! ```bash
//! dvc init
//! dvc add notes.txt
//! dvc commit "first notes"
//! dvc branch feature
//! dvc checkout feature
//! dvc checkout -- notes.txt
//! dvc checkout 3f2a9c1 -- notes.txt
//! dvc merge feature
//!
//! # Sync with another repository on a shared filesystem
//! dvc add-remote origin ../shared/project
//! dvc push origin master
//! dvc pull origin master
//! dvc sync-log
//! ```
//!
//! Failures print their message on stdout and still exit with status 0.

mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dvc_core::{Error, Request, dispatch};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dvc")]
#[command(author = "DVC Contributors")]
#[command(version)]
#[command(about = "Single-user version control with filesystem remotes")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a repository in the current directory
    Init,

    /// Stage a file for the next commit
    Add { path: String },

    /// Commit the staged changes
    Commit { message: String },

    /// Unstage a file, or stage its removal if it is tracked
    Rm { path: String },

    /// Show the first-parent history of the current branch
    Log,

    /// Show every commit ever made
    #[command(name = "global-log")]
    GlobalLog,

    /// Print the ids of all commits with the given message
    Find { message: String },

    /// Show branches, staged files and working tree changes
    Status,

    /// Create a branch at the current head
    Branch { name: String },

    /// Delete a branch pointer
    #[command(name = "rm-branch")]
    RmBranch { name: String },

    /// Switch branches, or restore a file with `-- <file>`
    Checkout {
        /// Branch name, or commit id when a file follows `--`
        target: Option<String>,
        /// File to restore
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Check out a commit and move the current branch to it
    Reset { commit: String },

    /// Merge a branch into the current branch
    Merge { branch: String },

    /// Register another repository directory as a remote
    #[command(name = "add-remote")]
    AddRemote { name: String, dir: PathBuf },

    /// Forget a remote
    #[command(name = "rm-remote")]
    RmRemote { name: String },

    /// Copy the current branch's history to a remote branch
    Push { remote: String, branch: String },

    /// Copy a remote branch into `<remote>/<branch>`
    Fetch { remote: String, branch: String },

    /// Fetch, then merge the fetched branch
    Pull { remote: String, branch: String },

    /// List recorded push and fetch transfers
    #[command(name = "sync-log")]
    SyncLog,
}

impl Commands {
    fn into_request(self) -> dvc_core::Result<Request> {
        let request = match self {
            Commands::Init => Request::Init,
            Commands::Add { path } => Request::Add { path },
            Commands::Commit { message } => Request::Commit { message },
            Commands::Rm { path } => Request::Rm { path },
            Commands::Log => Request::Log,
            Commands::GlobalLog => Request::GlobalLog,
            Commands::Find { message } => Request::Find { message },
            Commands::Status => Request::Status,
            Commands::Branch { name } => Request::Branch { name },
            Commands::RmBranch { name } => Request::RmBranch { name },
            Commands::Checkout { target, file } => match (target, file) {
                (Some(name), None) => Request::CheckoutBranch { name },
                (None, Some(path)) => Request::CheckoutFile { path },
                (Some(commit), Some(path)) => Request::CheckoutFileAt { commit, path },
                (None, None) => {
                    return Err(Error::InvalidOperands(
                        "checkout needs a branch or `-- <file>`".to_string(),
                    ));
                }
            },
            Commands::Reset { commit } => Request::Reset { commit },
            Commands::Merge { branch } => Request::Merge { branch },
            Commands::AddRemote { name, dir } => Request::AddRemote { name, path: dir },
            Commands::RmRemote { name } => Request::RmRemote { name },
            Commands::Push { remote, branch } => Request::Push { remote, branch },
            Commands::Fetch { remote, branch } => Request::Fetch { remote, branch },
            Commands::Pull { remote, branch } => Request::Pull { remote, branch },
            Commands::SyncLog => Request::SyncLog,
        };
        Ok(request)
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let directive = if verbose { "dvc=debug" } else { "dvc=warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();
    Ok(())
}

/// Usage errors become `InvalidOperands`; help and version output is not
/// a failure and returns `None`.
fn parse_failure(e: &clap::Error) -> Option<Error> {
    use clap::error::ErrorKind as ClapKind;
    match e.kind() {
        ClapKind::DisplayHelp
        | ClapKind::DisplayVersion
        | ClapKind::DisplayHelpOnMissingArgumentOrSubcommand => None,
        kind => Some(Error::InvalidOperands(kind.to_string())),
    }
}

fn main() -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            match parse_failure(&e) {
                Some(failure) => writeln!(stdout, "{}", failure)?,
                None => e.print()?,
            }
            return Ok(());
        }
    };
    init_tracing(cli.verbose)?;

    let Some(command) = cli.command else {
        writeln!(stdout, "Please enter a command.")?;
        return Ok(());
    };

    let work_dir = std::env::current_dir()?;
    let result = command
        .into_request()
        .and_then(|request| dispatch(&work_dir, request));
    match result {
        Ok(response) => render::render(&response, &mut stdout)?,
        Err(e) => {
            tracing::debug!("Command failed ({:?}): {}", e.kind(), e);
            writeln!(stdout, "{}", e)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Request {
        let argv = std::iter::once("dvc").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).unwrap();
        cli.command.unwrap().into_request().unwrap()
    }

    #[test]
    fn test_checkout_forms() {
        assert_eq!(
            parse(&["checkout", "feature"]),
            Request::CheckoutBranch {
                name: "feature".into()
            }
        );
        assert_eq!(
            parse(&["checkout", "--", "f.txt"]),
            Request::CheckoutFile {
                path: "f.txt".into()
            }
        );
        assert_eq!(
            parse(&["checkout", "3f2a9c1", "--", "f.txt"]),
            Request::CheckoutFileAt {
                commit: "3f2a9c1".into(),
                path: "f.txt".into()
            }
        );

        let cli = Cli::try_parse_from(["dvc", "checkout"]).unwrap();
        let err = cli.command.unwrap().into_request().unwrap_err();
        assert_eq!(err.kind(), dvc_core::ErrorKind::InvalidOperands);
    }

    #[test]
    fn test_remote_commands() {
        assert_eq!(
            parse(&["add-remote", "origin", "../shared"]),
            Request::AddRemote {
                name: "origin".into(),
                path: PathBuf::from("../shared"),
            }
        );
        assert_eq!(
            parse(&["pull", "origin", "master"]),
            Request::Pull {
                remote: "origin".into(),
                branch: "master".into()
            }
        );
        assert_eq!(parse(&["-v", "global-log"]), Request::GlobalLog);
    }

    #[test]
    fn test_usage_errors_are_invalid_operands() {
        for argv in [&["dvc", "commit"][..], &["dvc", "bogus"], &["dvc", "push", "origin"]] {
            let err = Cli::try_parse_from(argv.iter().copied()).unwrap_err();
            let failure = parse_failure(&err).unwrap();
            assert_eq!(failure.kind(), dvc_core::ErrorKind::InvalidOperands);
            assert!(failure.to_string().starts_with("Incorrect operands: "));
        }

        let err = Cli::try_parse_from(["dvc", "commit"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_eq!(
            parse_failure(&err).unwrap().to_string(),
            format!("Incorrect operands: {}", err.kind())
        );

        let help = Cli::try_parse_from(["dvc", "--help"]).unwrap_err();
        assert!(parse_failure(&help).is_none());
    }

    #[test]
    fn test_no_command() {
        let cli = Cli::try_parse_from(["dvc"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }
}

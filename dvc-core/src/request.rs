//! Typed requests: every command, resolved once at the boundary

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::merge::MergeOutcome;
use crate::object::{Commit, ObjectId};
use crate::remote::SyncOutcome;
use crate::repository::{PullOutcome, Repository, Status};
use crate::sync_log::SyncLogEntry;

/// One user command with its operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Init,
    Add { path: String },
    Commit { message: String },
    Rm { path: String },
    Log,
    GlobalLog,
    Find { message: String },
    Status,
    Branch { name: String },
    RmBranch { name: String },
    CheckoutBranch { name: String },
    CheckoutFile { path: String },
    CheckoutFileAt { commit: String, path: String },
    Reset { commit: String },
    Merge { branch: String },
    AddRemote { name: String, path: PathBuf },
    RmRemote { name: String },
    Push { remote: String, branch: String },
    Fetch { remote: String, branch: String },
    Pull { remote: String, branch: String },
    SyncLog,
}

impl Request {
    /// Command name as typed by the user
    pub fn name(&self) -> &'static str {
        match self {
            Request::Init => "init",
            Request::Add { .. } => "add",
            Request::Commit { .. } => "commit",
            Request::Rm { .. } => "rm",
            Request::Log => "log",
            Request::GlobalLog => "global-log",
            Request::Find { .. } => "find",
            Request::Status => "status",
            Request::Branch { .. } => "branch",
            Request::RmBranch { .. } => "rm-branch",
            Request::CheckoutBranch { .. }
            | Request::CheckoutFile { .. }
            | Request::CheckoutFileAt { .. } => "checkout",
            Request::Reset { .. } => "reset",
            Request::Merge { .. } => "merge",
            Request::AddRemote { .. } => "add-remote",
            Request::RmRemote { .. } => "rm-remote",
            Request::Push { .. } => "push",
            Request::Fetch { .. } => "fetch",
            Request::Pull { .. } => "pull",
            Request::SyncLog => "sync-log",
        }
    }
}

/// What a request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completed with nothing to report
    Done,
    Initialized { root: ObjectId, branch: String },
    Committed(ObjectId),
    /// Commits in display order
    Commits(Vec<(ObjectId, Commit)>),
    Found(Vec<ObjectId>),
    Status(Status),
    Reset(ObjectId),
    Merged(MergeOutcome),
    Pushed(SyncOutcome),
    Fetched(SyncOutcome),
    Pulled(PullOutcome),
    SyncLog(Vec<SyncLogEntry>),
}

/// Run `request` against the repository rooted at `work_dir`
pub fn dispatch(work_dir: &Path, request: Request) -> Result<Response> {
    tracing::debug!("Dispatching {} in {:?}", request.name(), work_dir);
    if request == Request::Init {
        let repo = Repository::init(work_dir)?;
        let branch = repo.current_branch()?;
        return Ok(Response::Initialized {
            root: branch.head,
            branch: branch.name,
        });
    }
    Repository::open(work_dir)?.execute(request)
}

impl Repository {
    /// Execute one request against this repository
    pub fn execute(&mut self, request: Request) -> Result<Response> {
        let response = match request {
            Request::Init => {
                return Err(Error::AlreadyInitialized(self.work_dir().to_path_buf()));
            }
            Request::Add { path } => {
                self.add(&path)?;
                Response::Done
            }
            Request::Commit { message } => Response::Committed(self.commit(&message)?),
            Request::Rm { path } => {
                self.rm(&path)?;
                Response::Done
            }
            Request::Log => Response::Commits(self.log()?),
            Request::GlobalLog => Response::Commits(self.global_log()?),
            Request::Find { message } => Response::Found(self.find(&message)?),
            Request::Status => Response::Status(self.status()?),
            Request::Branch { name } => {
                self.branch(&name)?;
                Response::Done
            }
            Request::RmBranch { name } => {
                self.rm_branch(&name)?;
                Response::Done
            }
            Request::CheckoutBranch { name } => {
                self.checkout_branch(&name)?;
                Response::Done
            }
            Request::CheckoutFile { path } => {
                self.checkout_file(&path)?;
                Response::Done
            }
            Request::CheckoutFileAt { commit, path } => {
                self.checkout_file_at(&commit, &path)?;
                Response::Done
            }
            Request::Reset { commit } => Response::Reset(self.reset(&commit)?),
            Request::Merge { branch } => Response::Merged(self.merge(&branch)?),
            Request::AddRemote { name, path } => {
                self.add_remote(&name, &path)?;
                Response::Done
            }
            Request::RmRemote { name } => {
                self.rm_remote(&name)?;
                Response::Done
            }
            Request::Push { remote, branch } => Response::Pushed(self.push(&remote, &branch)?),
            Request::Fetch { remote, branch } => Response::Fetched(self.fetch(&remote, &branch)?),
            Request::Pull { remote, branch } => Response::Pulled(self.pull(&remote, &branch)?),
            Request::SyncLog => Response::SyncLog(self.sync_log()?),
        };
        Ok(response)
    }
}

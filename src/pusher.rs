use crate::changeset::ChangeSet;
use crate::constants::{DEFAULT_COMMIT_MESSAGE, DEFAULT_PUSH_TIMEOUT_SECS, DEFAULT_REMOTE};
use crate::error::GitError;
use crate::git::{self, CommitOutcome, PushResult};
use crate::process::ProcessRunner;
use std::path::Path;
use std::time::Duration;

/// what to commit and where to push it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub commit_message: String,
    /// empty means "stay on the current branch"
    pub branch: String,
    pub remote: String,
    pub push_timeout: Option<Duration>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            branch: String::new(),
            remote: DEFAULT_REMOTE.to_string(),
            push_timeout: Some(Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECS)),
        }
    }
}

/// successful terminal states of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// the working tree was clean, nothing was staged
    NoChanges,
    /// changes were staged but git found nothing to record
    NothingToCommit,
    Pushed(PushResult),
}

/// progress notifications, emitted as each gate is passed
#[derive(Debug, Clone, Copy)]
pub enum Step<'a> {
    RootResolved(&'a Path),
    ChangesDetected(&'a ChangeSet),
    Staging,
    Committing(&'a str),
    Committed(&'a str),
    BranchResolved {
        branch: &'a str,
        created: bool,
    },
    Pushing {
        remote: &'a str,
        branch: &'a str,
        url: &'a str,
    },
}

/// stage, commit, pick the branch and push, in one linear pass
///
/// every gate either advances or ends the run; nothing is retried and a
/// commit is never rolled back. a checkout or push failure therefore leaves
/// the new commit in local history, see `GitError::leaves_unpushed_commit`.
pub fn doall(
    runner: &dyn ProcessRunner,
    cwd: &Path,
    request: &RunRequest,
    observer: &mut dyn FnMut(Step<'_>),
) -> Result<Outcome, GitError> {
    let root = git::find_root(runner, cwd)?;
    observer(Step::RootResolved(&root));

    let changes = git::detect_changes(runner, &root)?;
    if changes.is_empty() {
        return Ok(Outcome::NoChanges);
    }
    observer(Step::ChangesDetected(&changes));

    let message = if request.commit_message.trim().is_empty() {
        DEFAULT_COMMIT_MESSAGE
    } else {
        request.commit_message.as_str()
    };
    observer(Step::Staging);
    git::stage(runner, &root)?;

    observer(Step::Committing(message));
    match git::commit(runner, &root, message)? {
        CommitOutcome::Created(message) => observer(Step::Committed(&message)),
        CommitOutcome::NothingToCommit => return Ok(Outcome::NothingToCommit),
        CommitOutcome::Failed(output) => return Err(GitError::CommitFailed(output)),
    }

    let branch = git::resolve_and_checkout(runner, &root, &request.branch)?;
    observer(Step::BranchResolved {
        branch: &branch.name,
        created: branch.created,
    });

    let remote = if request.remote.trim().is_empty() {
        DEFAULT_REMOTE
    } else {
        request.remote.trim()
    };
    let url = git::remote_url(runner, &root, remote);
    observer(Step::Pushing {
        remote,
        branch: &branch.name,
        url: &url,
    });
    git::push(runner, &root, remote, &branch.name, request.push_timeout)?;

    Ok(Outcome::Pushed(PushResult {
        branch: branch.name,
        remote_name: remote.to_string(),
        remote_url: url,
    }))
}

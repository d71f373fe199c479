use crate::changeset::ChangeSet;
use crate::error::GitError;
use crate::process::ProcessRunner;
use git2::{Repository, RepositoryState};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// substrings git prints when a commit has nothing to record
const NOTHING_TO_COMMIT_MARKERS: [&str; 2] = ["nothing to commit", "no changes added to commit"];

/// result of attempting a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Created(String),
    NothingToCommit,
    Failed(String),
}

/// the branch a push run ended up on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBranch {
    pub name: String,
    pub created: bool,
}

/// descriptor of a successful push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub branch: String,
    pub remote_name: String,
    pub remote_url: String,
}

/// sanity check that we're in a git repository that isn't mid-operation
///
/// read-only; all mutations go through the git binary. failures use the same
/// variants the push flow reports, so the message reads the same either way
pub fn sanity_check(path: &Path) -> Result<(), GitError> {
    // can be anywhere within the repo
    let repo = Repository::discover(path)
        .map_err(|e| GitError::NotARepository(e.message().to_string()))?;

    if repo.is_bare() {
        return Err(GitError::NotARepository(
            "repository is bare, there is no working tree to push".to_string(),
        ));
    }

    if repo.state() != RepositoryState::Clean {
        return Err(GitError::StatusCheckFailed(
            "repository is in the middle of an operation (merge, rebase, etc)".to_string(),
        ));
    }

    Ok(())
}

/// absolute path of the working tree root containing `cwd`
pub fn find_root(runner: &dyn ProcessRunner, cwd: &Path) -> Result<PathBuf, GitError> {
    let output = runner
        .run(cwd, &["rev-parse", "--show-toplevel"])
        .map_err(|e| GitError::NotARepository(e.combined()))?;

    let root = output.stdout.trim();
    if root.is_empty() {
        return Err(GitError::NotARepository(
            "git did not report a working tree root".to_string(),
        ));
    }
    Ok(PathBuf::from(root))
}

/// pending changes in the working tree, staged or not, including untracked files
pub fn detect_changes(runner: &dyn ProcessRunner, root: &Path) -> Result<ChangeSet, GitError> {
    let output = runner
        .run(root, &["status", "--porcelain"])
        .map_err(|e| GitError::StatusCheckFailed(e.combined()))?;
    Ok(ChangeSet::from_porcelain(&output.stdout))
}

/// stage the whole working tree, untracked files included
pub fn stage(runner: &dyn ProcessRunner, root: &Path) -> Result<(), GitError> {
    runner
        .run(root, &["add", "."])
        .map_err(|e| GitError::StageFailed(e.combined()))?;
    Ok(())
}

/// commit whatever is staged with `message`
///
/// the message is handed to git as a single argument, no shell is involved,
/// so quotes and other metacharacters are recorded verbatim. a failed commit
/// leaves the files staged.
pub fn commit(
    runner: &dyn ProcessRunner,
    root: &Path,
    message: &str,
) -> Result<CommitOutcome, GitError> {
    match runner.run(root, &["commit", "-m", message]) {
        Ok(_) => Ok(CommitOutcome::Created(message.to_string())),
        Err(e) => Ok(classify_commit_failure(&e.combined())),
    }
}

/// decide whether a failed commit was benign ("nothing to commit") or fatal
pub fn classify_commit_failure(output: &str) -> CommitOutcome {
    if NOTHING_TO_COMMIT_MARKERS
        .iter()
        .any(|marker| output.contains(marker))
    {
        CommitOutcome::NothingToCommit
    } else {
        CommitOutcome::Failed(output.to_string())
    }
}

/// switch to `requested`, creating it from HEAD if needed
///
/// an empty request means the current branch, so a run without a branch
/// never moves the user somewhere else
pub fn resolve_and_checkout(
    runner: &dyn ProcessRunner,
    root: &Path,
    requested: &str,
) -> Result<ResolvedBranch, GitError> {
    let requested = requested.trim();
    let name = if requested.is_empty() {
        current_branch(runner, root)?
    } else {
        requested.to_string()
    };
    validate_branch_name(&name)?;

    let listing = runner
        .run(root, &["branch", "--list"])
        .map_err(|e| GitError::CheckoutFailed(e.combined()))?;
    let exists = branch_listed(&listing.stdout, &name);

    let args = if exists {
        vec!["checkout", name.as_str()]
    } else {
        vec!["checkout", "-b", name.as_str()]
    };
    runner
        .run(root, &args)
        .map_err(|e| GitError::CheckoutFailed(e.combined()))?;

    Ok(ResolvedBranch {
        name,
        created: !exists,
    })
}

fn current_branch(runner: &dyn ProcessRunner, root: &Path) -> Result<String, GitError> {
    let output = runner
        .run(root, &["rev-parse", "--abbrev-ref", "HEAD"])
        .map_err(|e| GitError::CheckoutFailed(e.combined()))?;
    let name = output.stdout.trim().to_string();

    // rev-parse prints the literal "HEAD" when detached
    if name == "HEAD" {
        return Err(GitError::CheckoutFailed(
            "HEAD is detached, name a branch to push to".to_string(),
        ));
    }
    Ok(name)
}

fn validate_branch_name(name: &str) -> Result<(), GitError> {
    if name.is_empty() || name.starts_with('-') || name.chars().any(char::is_whitespace) {
        return Err(GitError::CheckoutFailed(format!(
            "invalid branch name: {name:?}"
        )));
    }
    Ok(())
}

/// exact match against `git branch --list` output
///
/// each line is prefixed by a two-column marker ("* " current, "+ " checked out
/// in another worktree), so compare the remainder as a whole token
pub fn branch_listed(listing: &str, name: &str) -> bool {
    listing
        .lines()
        .map(|line| line.get(2..).unwrap_or("").trim())
        .any(|branch| branch == name)
}

/// push `branch` to `remote` with upstream tracking
pub fn push(
    runner: &dyn ProcessRunner,
    root: &Path,
    remote: &str,
    branch: &str,
    timeout: Option<Duration>,
) -> Result<(), GitError> {
    if remote.is_empty() || remote.starts_with('-') {
        return Err(GitError::PushFailed(format!("invalid remote name: {remote:?}")));
    }

    runner
        .run_bounded(root, &["push", "-u", remote, branch], timeout)
        .map_err(|e| GitError::PushFailed(e.combined()))?;
    Ok(())
}

/// configured url of `remote`, or a placeholder; informational only
pub fn remote_url(runner: &dyn ProcessRunner, root: &Path, remote: &str) -> String {
    let key = format!("remote.{remote}.url");
    match runner.run(root, &["config", "--get", &key]) {
        Ok(output) if !output.stdout.trim().is_empty() => output.stdout.trim().to_string(),
        _ => format!("(no remote '{remote}' configured)"),
    }
}

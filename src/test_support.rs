use crate::error::ProcessError;
use crate::process::{ProcessOutput, ProcessRunner};
use git2::Repository;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// scripted stand-in for the git binary
///
/// responses are keyed by the space-joined argument list; anything not
/// scripted succeeds with empty output. every call is recorded.
#[derive(Default)]
pub(crate) struct FakeRunner {
    responses: HashMap<String, Result<ProcessOutput, ProcessError>>,
    calls: RefCell<Vec<String>>,
    timeouts: RefCell<Vec<Option<Duration>>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ok(mut self, command: &str, stdout: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            Ok(ProcessOutput {
                stdout: stdout.to_string(),
                ..ProcessOutput::default()
            }),
        );
        self
    }

    pub(crate) fn fail(mut self, command: &str, stdout: &str, stderr: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            Err(ProcessError {
                command: format!("git {command}"),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code: Some(1),
                message: "exited with code 1".to_string(),
            }),
        );
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn called(&self, command: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == command)
    }

    pub(crate) fn bounded_timeouts(&self) -> Vec<Option<Duration>> {
        self.timeouts.borrow().clone()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, _cwd: &Path, args: &[&str]) -> Result<ProcessOutput, ProcessError> {
        let key = args.join(" ");
        self.calls.borrow_mut().push(key.clone());
        self.responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Ok(ProcessOutput::default()))
    }

    fn run_bounded(
        &self,
        cwd: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError> {
        self.timeouts.borrow_mut().push(timeout);
        self.run(cwd, args)
    }
}

/// helper to initialise a test git repository on branch `main`
pub(crate) fn setup_test_repo() -> (TempDir, Repository) {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();
    repo.set_head("refs/heads/main").unwrap();

    // configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();
    config.set_bool("commit.gpgsign", false).unwrap();

    (temp_dir, repo)
}

/// helper to create a bare repository to push to
pub(crate) fn setup_bare_remote() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    Repository::init_bare(temp_dir.path()).unwrap();
    temp_dir
}

/// helper to create a file with content
pub(crate) fn create_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// helper to commit all changes
pub(crate) fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let signature = repo.signature().unwrap();

    let parent_commit = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}

/// number of commits reachable from HEAD
pub(crate) fn history_len(repo: &Repository) -> usize {
    let mut walk = repo.revwalk().unwrap();
    walk.push_head().unwrap();
    walk.count()
}

/// short name of the branch HEAD points at
pub(crate) fn head_branch(repo: &Repository) -> String {
    repo.head().unwrap().shorthand().unwrap().to_string()
}

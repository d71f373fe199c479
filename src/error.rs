use thiserror::Error;

/// failure of a single git subprocess invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{command}` failed: {message}")]
pub struct ProcessError {
    /// shell-quoted command line, for display only
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// exit code when the process ran to completion
    pub exit_code: Option<i32>,
    pub message: String,
}

impl ProcessError {
    /// stdout, stderr and the error message joined together
    ///
    /// git reports most conditions as free text, so callers classify failures
    /// by searching this string.
    pub fn combined(&self) -> String {
        [
            self.stdout.trim(),
            self.stderr.trim(),
            self.message.trim(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// terminal failures of a push run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("not in a git repository: {0}")]
    NotARepository(String),

    #[error("failed to check git status: {0}")]
    StatusCheckFailed(String),

    #[error("failed to stage changes: {0}")]
    StageFailed(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("branch checkout failed: {0}")]
    CheckoutFailed(String),

    #[error("push failed: {0}")]
    PushFailed(String),
}

impl GitError {
    /// true when the run failed after the commit was created, leaving it
    /// in local history without reaching the remote
    pub fn leaves_unpushed_commit(&self) -> bool {
        matches!(self, Self::CheckoutFailed(_) | Self::PushFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_error(stdout: &str, stderr: &str, message: &str) -> ProcessError {
        ProcessError {
            command: "git commit -m test".to_string(),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(1),
            message: message.to_string(),
        }
    }

    #[test]
    fn combined_joins_non_empty_parts() {
        let err = process_error("On branch main\n", "", "exit status 1");
        assert_eq!(err.combined(), "On branch main\nexit status 1");
    }

    #[test]
    fn combined_is_empty_when_nothing_captured() {
        assert_eq!(process_error("", "  ", "").combined(), "");
    }

    #[test]
    fn only_post_commit_failures_leave_unpushed_commit() {
        assert!(GitError::CheckoutFailed(String::new()).leaves_unpushed_commit());
        assert!(GitError::PushFailed(String::new()).leaves_unpushed_commit());
        assert!(!GitError::NotARepository(String::new()).leaves_unpushed_commit());
        assert!(!GitError::StatusCheckFailed(String::new()).leaves_unpushed_commit());
        assert!(!GitError::StageFailed(String::new()).leaves_unpushed_commit());
        assert!(!GitError::CommitFailed(String::new()).leaves_unpushed_commit());
    }
}

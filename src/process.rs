use crate::error::ProcessError;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// captured output of a successful git invocation
///
/// stdout is kept untrimmed; `status --porcelain` lines start with a
/// significant space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// runs git subcommands; the orchestration logic only talks to git through
/// this trait so it can be driven by a scripted fake in tests
pub trait ProcessRunner {
    /// run `git <args>` in `cwd`, blocking until it exits
    fn run(&self, cwd: &Path, args: &[&str]) -> Result<ProcessOutput, ProcessError>;

    /// like `run`, but kill the process if it is still running after `timeout`
    fn run_bounded(
        &self,
        cwd: &Path,
        args: &[&str],
        _timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError> {
        self.run(cwd, args)
    }
}

/// the real `git` binary
#[derive(Debug, Clone, Default)]
pub struct SystemGit {
    verbose: bool,
}

impl SystemGit {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn command(&self, cwd: &Path, args: &[&str]) -> Command {
        if self.verbose {
            crate::debug!("$ {}", command_line(args));
        }
        let mut command = Command::new("git");
        // failures are classified by message text, keep git's output untranslated
        command
            .args(args)
            .current_dir(cwd)
            .env("LC_ALL", "C")
            .env("LANGUAGE", "C")
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn trace(
        &self,
        result: Result<ProcessOutput, ProcessError>,
    ) -> Result<ProcessOutput, ProcessError> {
        if self.verbose {
            let (code, stderr) = match &result {
                Ok(output) => (Some(output.exit_code), output.stderr.trim()),
                Err(e) => (e.exit_code, e.stderr.trim()),
            };
            if !stderr.is_empty() {
                crate::debug!("{}", stderr);
            }
            match code {
                Some(code) => crate::debug!("  exit {}", code),
                None => crate::debug!("  no exit code"),
            }
        }
        result
    }
}

impl ProcessRunner for SystemGit {
    fn run(&self, cwd: &Path, args: &[&str]) -> Result<ProcessOutput, ProcessError> {
        let output = self
            .command(cwd, args)
            .output()
            .map_err(|e| spawn_error(args, &e))?;
        self.trace(finish(args, &output))
    }

    fn run_bounded(
        &self,
        cwd: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError> {
        let Some(timeout) = timeout else {
            return self.run(cwd, args);
        };

        let mut child = self
            .command(cwd, args)
            .spawn()
            .map_err(|e| spawn_error(args, &e))?;

        // drain pipes on their own threads so a chatty child cannot block on a full pipe
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => {
                let output = Output {
                    status,
                    stdout: join_drain(stdout),
                    stderr: join_drain(stderr),
                };
                self.trace(finish(args, &output))
            }
            Ok(None) => {
                // readers are left detached; a grandchild such as ssh may still hold the pipes
                kill(&mut child);
                Err(ProcessError {
                    command: command_line(args),
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                    message: format!("timed out after {}s", timeout.as_secs()),
                })
            }
            Err(e) => {
                kill(&mut child);
                Err(ProcessError {
                    command: command_line(args),
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                    message: format!("failed to wait for git: {e}"),
                })
            }
        }
    }
}

/// `git <args>`, shell-quoted for display
pub fn command_line(args: &[&str]) -> String {
    let mut parts = vec!["git"];
    parts.extend_from_slice(args);
    shlex::try_join(parts.iter().copied()).unwrap_or_else(|_| parts.join(" "))
}

fn finish(args: &[&str], output: &Output) -> Result<ProcessOutput, ProcessError> {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        return Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code: 0,
        });
    }

    let exit_code = output.status.code();
    let message = match exit_code {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_string(),
    };
    Err(ProcessError {
        command: command_line(args),
        stdout,
        stderr,
        exit_code,
        message,
    })
}

fn spawn_error(args: &[&str], e: &std::io::Error) -> ProcessError {
    ProcessError {
        command: command_line(args),
        stdout: String::new(),
        stderr: String::new(),
        exit_code: None,
        message: format!("failed to run git (is it installed?): {e}"),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_drain(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        crate::warning!("failed to kill git process: {}", e);
    }
    let _ = child.wait();
}

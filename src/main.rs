mod changeset;
mod cli;
mod config;
mod config_command;
mod constants;
mod context;
mod credentials;
mod error;
mod git;
mod intent;
mod process;
mod pusher;
mod ui;
mod usage;

#[cfg(test)]
mod test_support;

use crate::cli::{Cli, Command};
use crate::constants::{LOW_LIMIT_WARNING, MAX_FILES_TO_SHOW};
use crate::context::AppContext;
use crate::error::GitError;
use crate::intent::{Extraction, Intent, KeyRejected};
use crate::pusher::{Outcome, RunRequest, Step};
use crate::usage::{HttpSink, RequestDetails, RunStatus, UsageRecord};
use anyhow::{Result, bail};
use colored::Colorize;
use indicatif::ProgressBar;
use std::path::Path;

fn main() {
    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let mut ctx = AppContext::load(cli.verbose)?;

    if let Some(Command::Config { action }) = cli.command {
        return config_command::run(&mut ctx, action);
    }

    let instruction = cli.instruction();
    if instruction.is_empty() {
        info!("usage: gitpusher \"what you changed\" [--remote <name>]");
        info!("   or: gitpusher config");
        return Ok(());
    }

    // gates, nothing below may touch the repository until these pass; a run
    // stopped here never reached the model so it is not metered
    usage::check_limit(&ctx.config)?;
    if !credentials::ensure_credential(&mut ctx)? {
        bail!("an api key is required to continue");
    }
    git::sanity_check(Path::new("."))?;

    let extraction = understand(&mut ctx, &instruction)?;
    let remote = cli
        .remote
        .clone()
        .unwrap_or_else(|| ctx.config.default_remote.clone());
    let request = RunRequest {
        commit_message: extraction.intent.commit_message.clone(),
        branch: extraction.intent.branch.clone(),
        remote,
        push_timeout: ctx.config.push_timeout(),
    };

    ui::heading("gitpusher");
    let mut reporter = Reporter::default();
    let result = pusher::doall(&ctx.git(), Path::new("."), &request, &mut |step| {
        reporter.step(step);
    });
    reporter.finish(&result);

    report_usage(&mut ctx, &instruction, &extraction, &request, &result);

    match result {
        Ok(Outcome::Pushed(pushed)) => {
            ui::heading("push summary");
            ui::row("branch", &pushed.branch, false);
            ui::row("remote", &pushed.remote_name, false);
            ui::row("repository", &pushed.remote_url, false);
            ui::row("message", &request.commit_message, true);
            info!();
            status!("all done, your code is pushed");
            Ok(())
        }
        Ok(Outcome::NoChanges) => {
            warning!("no changes detected, nothing to commit or push");
            Ok(())
        }
        Ok(Outcome::NothingToCommit) => {
            warning!("nothing to commit");
            Ok(())
        }
        Err(e) => {
            if e.leaves_unpushed_commit() {
                warning!(
                    "the commit \"{}\" was created locally but has NOT been pushed",
                    request.commit_message
                );
            }
            Err(e.into())
        }
    }
}

/// ask the model what the instruction means, degrading to a local guess
///
/// a rejected api key is the one failure that stops the run
fn understand(ctx: &mut AppContext, instruction: &str) -> Result<Extraction> {
    let fallback = || Extraction {
        intent: Intent::fallback(instruction),
        response_len: 0,
        parsed: false,
    };

    loop {
        let Some(api_key) = ctx.config.resolved_api_key() else {
            return Ok(fallback());
        };

        let spinner = ui::spinner("understanding your request...");
        match intent::extract(&api_key, &ctx.config.resolved_model(), instruction) {
            Ok(extraction) => {
                spinner.finish_and_clear();
                if !extraction.parsed {
                    warning!("could not parse the model response, using your words as the message");
                }
                return Ok(extraction);
            }
            Err(e) => {
                ui::spinner_failed(&spinner, &format!("{e:#}"));
                if e.downcast_ref::<KeyRejected>().is_none() {
                    warning!("using your words as the commit message");
                    return Ok(fallback());
                }
                if !credentials::handle_rejected_key(ctx)? {
                    bail!("a valid api key is required to continue");
                }
            }
        }
    }
}

/// metering is best-effort, failures never change the run's outcome
fn report_usage(
    ctx: &mut AppContext,
    instruction: &str,
    extraction: &Extraction,
    request: &RunRequest,
    result: &Result<Outcome, GitError>,
) {
    let (status, branch, remote, repolink) = match result {
        Ok(Outcome::Pushed(pushed)) => (
            RunStatus::Success,
            pushed.branch.clone(),
            pushed.remote_name.clone(),
            pushed.remote_url.clone(),
        ),
        Ok(_) => (
            RunStatus::Skipped,
            request.branch.clone(),
            request.remote.clone(),
            String::new(),
        ),
        Err(_) => (
            RunStatus::Failure,
            request.branch.clone(),
            request.remote.clone(),
            String::new(),
        ),
    };
    let record = UsageRecord {
        commit_message: request.commit_message.clone(),
        status,
        branch,
        remote,
        repolink,
        request_details: RequestDetails {
            user_input: instruction.to_string(),
            model_response_length: extraction.response_len,
            response_mime_type: "application/json".to_string(),
        },
        timestamp: chrono::Utc::now(),
    };

    match usage::track(ctx, record, &HttpSink) {
        Ok(report) => {
            if ctx.verbose {
                debug!(
                    "usage tracked ({} cached, {} synced)",
                    report.cached,
                    report.synced
                );
            }
            match report.remaining {
                Some(0) => warning!(
                    "that was your last run, add a new token with `gitpusher config token`"
                ),
                Some(left) if left <= LOW_LIMIT_WARNING => {
                    warning!("{} run(s) left on your usage limit", left)
                }
                _ => {}
            }
        }
        Err(e) => warning!("failed to record usage: {:#}", e),
    }
}

/// turns orchestration steps into spinners and status lines
#[derive(Default)]
struct Reporter {
    spinner: Option<ProgressBar>,
}

impl Reporter {
    fn step(&mut self, step: Step<'_>) {
        match step {
            Step::RootResolved(root) => {
                info!("{} {}", "repository:".dimmed(), root.display());
                self.begin("checking for changes...");
            }
            Step::ChangesDetected(changes) => {
                self.done("changes detected");
                show_changes(changes);
            }
            Step::Staging => self.begin("staging changes..."),
            Step::Committing(message) => {
                self.begin(format!("committing \"{message}\"..."));
            }
            Step::Committed(message) => {
                self.done(&format!("commit created: \"{}\"", message.white()));
            }
            Step::BranchResolved { branch, created } => {
                if created {
                    status!("created branch {}", branch.white());
                } else {
                    status!("on branch {}", branch.white());
                }
            }
            Step::Pushing {
                remote,
                branch,
                url,
            } => {
                self.begin(format!("pushing to {remote}/{branch} ({url})..."));
            }
        }
    }

    fn finish(&mut self, result: &Result<Outcome, GitError>) {
        let Some(spinner) = self.spinner.take() else {
            return;
        };
        match result {
            Ok(Outcome::Pushed(pushed)) => ui::spinner_done(
                &spinner,
                &format!("pushed to {}/{}", pushed.remote_name, pushed.branch),
            ),
            Ok(_) => spinner.finish_and_clear(),
            Err(e) => ui::spinner_failed(&spinner, &e.to_string()),
        }
    }

    fn begin(&mut self, message: impl Into<String>) {
        if let Some(previous) = self.spinner.take() {
            previous.finish_and_clear();
        }
        self.spinner = Some(ui::spinner(message));
    }

    fn done(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => ui::spinner_done(&spinner, message),
            None => status!("{}", message),
        }
    }
}

fn show_changes(changes: &changeset::ChangeSet) {
    let count = changes.count();
    let file_word = if count == 1 { "file" } else { "files" };
    info!("{} {} {}:", "committing".dimmed(), count, file_word);

    for entry in changes.entries.iter().take(MAX_FILES_TO_SHOW) {
        let label = match entry.status {
            changeset::StatusCode::Modified => entry.status.label().yellow(),
            changeset::StatusCode::Added | changeset::StatusCode::Untracked => {
                entry.status.label().green()
            }
            changeset::StatusCode::Deleted => entry.status.label().red(),
            changeset::StatusCode::Other => entry.status.label().normal(),
        };
        info!("  {} {} {}", entry.code.dimmed(), label, entry.path);
    }

    // show count of remaining files if there are more than MAX_FILES_TO_SHOW
    if count > MAX_FILES_TO_SHOW {
        info!("  (+{} more)", count - MAX_FILES_TO_SHOW);
    }
}

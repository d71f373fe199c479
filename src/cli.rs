use clap::{Parser, Subcommand, ValueEnum};

/// gitpusher: describe what you did in plain words, and it commits and pushes it
#[derive(Parser, Debug)]
#[command(
    name = "gitpusher",
    version,
    about,
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// remote to push to (default: configured remote, usually origin)
    #[arg(short, long)]
    pub remote: Option<String>,

    /// print every git command before running it
    #[arg(short, long)]
    pub verbose: bool,

    /// what to do, eg. "push the login fix to the auth branch"
    pub instruction: Vec<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// manage the api key, metering token and usage cache
    Config {
        /// action to run; without one an interactive menu is shown
        #[arg(value_enum)]
        action: Option<ConfigAction>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// set the gemini api key
    Key,
    /// set the metering token and usage limit
    Token,
    /// show the current configuration and remaining usage
    Info,
    /// send cached usage records now
    Sync,
    /// delete the stored api key
    Delete,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// the free-text instruction as typed
    pub fn instruction(&self) -> String {
        self.instruction.join(" ").trim().to_string()
    }
}

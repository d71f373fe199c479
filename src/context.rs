use crate::config::{Config, Paths};
use crate::process::SystemGit;
use anyhow::Result;

/// application context shared by the push flow and the config command
pub struct AppContext {
    /// settings loaded at startup; write back with `save_config`
    pub config: Config,

    /// where config and the usage cache live
    pub paths: Paths,

    /// echo every git command before running it
    pub verbose: bool,
}

impl AppContext {
    /// load the config from the platform config dir
    pub fn load(verbose: bool) -> Result<Self> {
        Self::load_from(Paths::discover()?, verbose)
    }

    pub fn load_from(paths: Paths, verbose: bool) -> Result<Self> {
        let config = Config::load(&paths.config())?;
        Ok(Self {
            config,
            paths,
            verbose,
        })
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.paths.config())
    }

    pub fn git(&self) -> SystemGit {
        SystemGit::new(self.verbose)
    }
}

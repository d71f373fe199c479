use crate::constants::{
    API_KEY_ENV_VARS, DEFAULT_MODEL, DEFAULT_PUSH_TIMEOUT_SECS, DEFAULT_REMOTE, MODEL_ENV_VAR,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";
const USAGE_CACHE_FILE: &str = "usage_cache.json";

/// persisted settings, `~/.config/gitpusher/config.json` on linux
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// gemini api key
    pub api_key: Option<String>,
    pub model: String,
    /// metering token, sent along with usage data
    pub token: Option<String>,
    /// remaining runs; `None` is unmetered
    pub limit: Option<u32>,
    pub default_remote: String,
    /// 0 disables the push timeout
    pub push_timeout_secs: u64,
    /// where batched usage records are posted, if anywhere
    pub usage_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            token: None,
            limit: None,
            default_remote: DEFAULT_REMOTE.to_string(),
            push_timeout_secs: DEFAULT_PUSH_TIMEOUT_SECS,
            usage_endpoint: None,
        }
    }
}

impl Config {
    /// read the config, a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
    }

    /// api key set through one of the environment variables, if any
    pub fn env_api_key() -> Option<String> {
        API_KEY_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
    }

    /// api key from the environment, falling back to the stored one
    pub fn resolved_api_key(&self) -> Option<String> {
        Self::env_api_key()
            .or_else(|| self.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub fn resolved_model(&self) -> String {
        std::env::var(MODEL_ENV_VAR)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.model.clone())
    }

    pub fn push_timeout(&self) -> Option<Duration> {
        (self.push_timeout_secs > 0).then(|| Duration::from_secs(self.push_timeout_secs))
    }
}

/// locations of the files gitpusher keeps between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub dir: PathBuf,
}

impl Paths {
    /// the platform config dir, eg. `~/.config/gitpusher`
    pub fn discover() -> Result<Self> {
        let base = dirs::config_dir().context("could not determine config directory")?;
        Ok(Self::at(base.join("gitpusher")))
    }

    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn config(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn usage_cache(&self) -> PathBuf {
        self.dir.join(USAGE_CACHE_FILE)
    }
}

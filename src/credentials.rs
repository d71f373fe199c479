use crate::config::Config;
use crate::constants::API_KEY_ENV_VARS;
use crate::context::AppContext;
use crate::{info, status, ui, warning};
use anyhow::Result;
use std::io::IsTerminal;

/// make sure an api key is available before anything touches the repository
///
/// returns false when there is no key and the user declined to add one
pub fn ensure_credential(ctx: &mut AppContext) -> Result<bool> {
    if ctx.config.resolved_api_key().is_some() {
        return Ok(true);
    }

    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        warning!("no api key configured; set GEMINI_API_KEY or run `gitpusher config key`");
        return Ok(false);
    }

    ui::heading("api key required");
    info!("gitpusher needs a Gemini API key to interpret your instructions.");
    if ui::choose("what would you like to do?", &["add key", "exit"])? != 'a' {
        return Ok(false);
    }

    prompt_and_store_key(ctx)
}

/// the model refused the key; offer to replace or delete it
///
/// returns true when a new key was stored and the request can be retried
pub fn handle_rejected_key(ctx: &mut AppContext) -> Result<bool> {
    if Config::env_api_key().is_some() {
        warning!(
            "the api key from the environment was rejected, update {}",
            API_KEY_ENV_VARS.join(" or ")
        );
        return Ok(false);
    }

    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        warning!("replace the api key with `gitpusher config key`");
        return Ok(false);
    }

    ui::heading("api key rejected");
    info!("the stored Gemini API key is invalid or has been revoked.");
    match ui::choose(
        "what would you like to do?",
        &["replace key", "delete key", "exit"],
    )? {
        'r' => prompt_and_store_key(ctx),
        'd' => {
            if delete_key(ctx)? {
                status!("api key deleted");
            }
            Ok(false)
        }
        _ => Ok(false),
    }
}

/// ask for a key and persist it, returns false if nothing was entered
pub fn prompt_and_store_key(ctx: &mut AppContext) -> Result<bool> {
    let Some(key) = ui::read_line("api key", "")? else {
        return Ok(false);
    };
    if key.is_empty() {
        warning!("api key cannot be empty");
        return Ok(false);
    }

    ctx.config.api_key = Some(key);
    ctx.save_config()?;
    status!("api key saved to {}", ctx.paths.config().display());
    Ok(true)
}

/// forget the stored key, the rest of the config is kept
pub fn delete_key(ctx: &mut AppContext) -> Result<bool> {
    if ctx.config.api_key.take().is_none() {
        return Ok(false);
    }
    ctx.save_config()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Paths};
    use tempfile::TempDir;

    #[test]
    fn delete_key_persists_removal() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::at(dir.path().to_path_buf());
        Config {
            api_key: Some("secret".to_string()),
            limit: Some(5),
            ..Config::default()
        }
        .save(&paths.config())
        .unwrap();
        let mut ctx = AppContext::load_from(paths.clone(), false).unwrap();

        assert!(delete_key(&mut ctx).unwrap());

        let reloaded = Config::load(&paths.config()).unwrap();
        assert_eq!(reloaded.api_key, None);
        assert_eq!(reloaded.limit, Some(5));
    }

    #[test]
    fn delete_key_without_key_is_noop() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::at(dir.path().to_path_buf());
        let mut ctx = AppContext::load_from(paths.clone(), false).unwrap();

        assert!(!delete_key(&mut ctx).unwrap());
        assert!(!paths.config().exists());
    }
}

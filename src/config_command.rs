use crate::cli::ConfigAction;
use crate::constants::LOW_LIMIT_WARNING;
use crate::context::AppContext;
use crate::usage::{self, HttpSink};
use crate::{credentials, info, status, ui, warning};
use anyhow::{Context, Result};
use num_format::{Locale, ToFormattedString};

/// `gitpusher config [action]`
pub fn run(ctx: &mut AppContext, action: Option<ConfigAction>) -> Result<()> {
    let action = match action {
        Some(action) => action,
        None => match menu()? {
            Some(action) => action,
            None => return Ok(()),
        },
    };

    match action {
        ConfigAction::Key => {
            if credentials::prompt_and_store_key(ctx)? {
                status!("api key updated");
            }
        }
        ConfigAction::Token => set_token(ctx)?,
        ConfigAction::Info => show_info(ctx)?,
        ConfigAction::Sync => sync(ctx)?,
        ConfigAction::Delete => delete(ctx)?,
    }
    Ok(())
}

fn menu() -> Result<Option<ConfigAction>> {
    ui::heading("gitpusher config");
    let choice = ui::choose(
        "what would you like to do?",
        &["key", "token", "info", "sync", "delete", "exit"],
    )?;
    Ok(match choice {
        'k' => Some(ConfigAction::Key),
        't' => Some(ConfigAction::Token),
        'i' => Some(ConfigAction::Info),
        's' => Some(ConfigAction::Sync),
        'd' => Some(ConfigAction::Delete),
        _ => None,
    })
}

fn set_token(ctx: &mut AppContext) -> Result<()> {
    let current = ctx.config.token.clone().unwrap_or_default();
    let Some(token) = ui::read_line("token", &current)? else {
        return Ok(());
    };
    if token.is_empty() {
        warning!("token cannot be empty");
        return Ok(());
    }

    let current_limit = ctx.config.limit.map(|l| l.to_string()).unwrap_or_default();
    let Some(limit) = ui::read_line("usage limit (blank for unlimited)", &current_limit)? else {
        return Ok(());
    };
    let limit = if limit.is_empty() {
        None
    } else {
        Some(
            limit
                .parse::<u32>()
                .with_context(|| format!("invalid usage limit: {limit}"))?,
        )
    };

    ctx.config.token = Some(token);
    ctx.config.limit = limit;
    ctx.save_config()?;
    status!("token saved");
    Ok(())
}

fn show_info(ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    let key = match config.resolved_api_key() {
        Some(key) => ui::mask_secret(&key),
        None => "(not set)".to_string(),
    };
    let token = config
        .token
        .as_deref()
        .map_or_else(|| "(not set)".to_string(), ui::mask_secret);
    let limit = config.limit.map_or_else(
        || "unlimited".to_string(),
        |l| l.to_formatted_string(&Locale::en),
    );
    let cached = usage::cached_count(ctx)?.to_formatted_string(&Locale::en);

    ui::heading("usage information");
    ui::row("config", &ctx.paths.config().display().to_string(), false);
    ui::row("api key", &key, false);
    ui::row("model", &config.resolved_model(), false);
    ui::row("token", &token, false);
    ui::row("default remote", &config.default_remote, false);
    ui::row("cached usage records", &cached, false);
    ui::row("remaining limit", &limit, true);
    info!();

    if config.limit.is_some_and(|l| l <= LOW_LIMIT_WARNING) {
        warning!("usage limit is running low");
    }
    Ok(())
}

fn sync(ctx: &AppContext) -> Result<()> {
    let spinner = ui::spinner("syncing cached usage records...");
    match usage::force_sync(ctx, &HttpSink) {
        Ok(0) => {
            spinner.finish_and_clear();
            info!("no cached usage records to sync");
        }
        Ok(count) => ui::spinner_done(&spinner, &format!("synced {count} usage record(s)")),
        Err(e) => {
            ui::spinner_failed(&spinner, "sync failed");
            return Err(e);
        }
    }
    Ok(())
}

/// forget the api key; token and limit stay so metering survives
fn delete(ctx: &mut AppContext) -> Result<()> {
    if ui::choose("delete the stored api key?", &["no", "yes"])? != 'y' {
        info!("cancelled");
        return Ok(());
    }

    if credentials::delete_key(ctx)? {
        status!("api key deleted");
    } else {
        info!("no stored api key to delete");
    }
    Ok(())
}

use crate::config::Config;
use crate::constants::{USAGE_BATCH_SIZE, USAGE_SYNC_TIMEOUT_SECS};
use crate::context::AppContext;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// how a run ended, as reported to the metering backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Skipped,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub user_input: String,
    pub model_response_length: usize,
    pub response_mime_type: String,
}

/// one finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub commit_message: String,
    pub status: RunStatus,
    pub branch: String,
    pub remote: String,
    pub repolink: String,
    pub request_details: RequestDetails,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncPayload<'a> {
    token: &'a str,
    limit: Option<u32>,
    usage_data: &'a [UsageRecord],
}

/// destination for batched usage records
pub trait UsageSink {
    fn send(&self, config: &Config, records: &[UsageRecord]) -> Result<()>;
}

/// posts records to the configured usage endpoint
pub struct HttpSink;

impl UsageSink for HttpSink {
    fn send(&self, config: &Config, records: &[UsageRecord]) -> Result<()> {
        let Some(endpoint) = config.usage_endpoint.as_deref() else {
            bail!("no usage endpoint configured");
        };
        let Some(token) = config.token.as_deref() else {
            bail!("no token configured, add one with `gitpusher config token`");
        };

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(USAGE_SYNC_TIMEOUT_SECS)))
            .build()
            .into();
        agent
            .post(endpoint)
            .send_json(&SyncPayload {
                token,
                limit: config.limit,
                usage_data: records,
            })
            .with_context(|| format!("failed to sync usage to {endpoint}"))?;
        Ok(())
    }
}

/// what `track` did, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackReport {
    pub cached: usize,
    pub synced: usize,
    /// remaining runs after this one, `None` when unmetered
    pub remaining: Option<u32>,
}

/// refuse to start when the configured limit is used up
pub fn check_limit(config: &Config) -> Result<()> {
    if config.limit == Some(0) {
        bail!("usage limit reached, add a new token with `gitpusher config token`");
    }
    Ok(())
}

/// record a finished run, syncing the cache once a batch is full
///
/// sync failures keep the records cached for the next attempt
pub fn track(ctx: &mut AppContext, record: UsageRecord, sink: &dyn UsageSink) -> Result<TrackReport> {
    let cache_path = ctx.paths.usage_cache();
    let mut cache = load_cache(&cache_path)?;
    cache.push(record);
    save_cache(&cache_path, &cache)?;

    let mut report = TrackReport {
        cached: cache.len(),
        ..TrackReport::default()
    };

    if cache.len() >= USAGE_BATCH_SIZE && can_sync(&ctx.config) {
        report.synced = flush(ctx, sink, &cache)?;
    }

    if let Some(limit) = ctx.config.limit {
        let remaining = limit.saturating_sub(1);
        ctx.config.limit = Some(remaining);
        ctx.save_config()?;
        report.remaining = Some(remaining);

        // last run: push out whatever is left
        if remaining == 0 && report.synced == 0 && can_sync(&ctx.config) {
            report.synced = flush(ctx, sink, &cache)?;
        }
    }

    report.cached = load_cache(&cache_path)?.len();
    Ok(report)
}

/// send every cached record now, returns how many were sent
pub fn force_sync(ctx: &AppContext, sink: &dyn UsageSink) -> Result<usize> {
    let cache = load_cache(&ctx.paths.usage_cache())?;
    if cache.is_empty() {
        return Ok(0);
    }
    sink.send(&ctx.config, &cache)?;
    save_cache(&ctx.paths.usage_cache(), &[])?;
    Ok(cache.len())
}

pub fn cached_count(ctx: &AppContext) -> Result<usize> {
    Ok(load_cache(&ctx.paths.usage_cache())?.len())
}

fn can_sync(config: &Config) -> bool {
    config.usage_endpoint.is_some() && config.token.is_some()
}

fn flush(ctx: &AppContext, sink: &dyn UsageSink, cache: &[UsageRecord]) -> Result<usize> {
    match sink.send(&ctx.config, cache) {
        Ok(()) => {
            save_cache(&ctx.paths.usage_cache(), &[])?;
            Ok(cache.len())
        }
        Err(e) => {
            crate::warning!("{:#}", e);
            Ok(0)
        }
    }
}

fn load_cache(path: &Path) -> Result<Vec<UsageRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    // a corrupt cache is not worth failing a run over
    Ok(serde_json::from_str(&data).unwrap_or_default())
}

fn save_cache(path: &Path, cache: &[UsageRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(cache)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        batches: RefCell<Vec<usize>>,
        fail: bool,
    }

    impl UsageSink for RecordingSink {
        fn send(&self, _config: &Config, records: &[UsageRecord]) -> Result<()> {
            if self.fail {
                bail!("backend unavailable");
            }
            self.batches.borrow_mut().push(records.len());
            Ok(())
        }
    }

    fn record(message: &str) -> UsageRecord {
        UsageRecord {
            commit_message: message.to_string(),
            status: RunStatus::Success,
            branch: "main".to_string(),
            remote: "origin".to_string(),
            repolink: "https://example.com/repo.git".to_string(),
            request_details: RequestDetails {
                user_input: "push".to_string(),
                model_response_length: 10,
                response_mime_type: "application/json".to_string(),
            },
            timestamp: Utc::now(),
        }
    }

    fn context(dir: &TempDir, config: Config) -> AppContext {
        let paths = Paths::at(dir.path().to_path_buf());
        config.save(&paths.config()).unwrap();
        AppContext::load_from(paths, false).unwrap()
    }

    fn syncing_config(limit: Option<u32>) -> Config {
        Config {
            token: Some("tok".to_string()),
            usage_endpoint: Some("https://usage.example.com/add".to_string()),
            limit,
            ..Config::default()
        }
    }

    #[test]
    fn check_limit_blocks_only_at_zero() {
        assert!(check_limit(&Config::default()).is_ok());
        assert!(check_limit(&syncing_config(Some(1))).is_ok());
        assert!(check_limit(&syncing_config(Some(0))).is_err());
    }

    #[test]
    fn records_are_batched() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, syncing_config(None));
        let sink = RecordingSink::default();

        let first = track(&mut ctx, record("one"), &sink).unwrap();
        let second = track(&mut ctx, record("two"), &sink).unwrap();
        assert_eq!(first.cached, 1);
        assert_eq!(second.cached, 2);
        assert!(sink.batches.borrow().is_empty());

        let third = track(&mut ctx, record("three"), &sink).unwrap();
        assert_eq!(third.synced, 3);
        assert_eq!(third.cached, 0);
        assert_eq!(*sink.batches.borrow(), vec![3]);
    }

    #[test]
    fn failed_sync_keeps_cache() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, syncing_config(None));
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };

        for message in ["one", "two", "three"] {
            track(&mut ctx, record(message), &sink).unwrap();
        }

        assert_eq!(cached_count(&ctx).unwrap(), 3);
    }

    #[test]
    fn limit_is_decremented_and_persisted() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, syncing_config(Some(5)));

        let report = track(&mut ctx, record("one"), &RecordingSink::default()).unwrap();

        assert_eq!(report.remaining, Some(4));
        assert_eq!(Config::load(&ctx.paths.config()).unwrap().limit, Some(4));
    }

    #[test]
    fn last_run_flushes_partial_batch() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, syncing_config(Some(1)));
        let sink = RecordingSink::default();

        let report = track(&mut ctx, record("one"), &sink).unwrap();

        assert_eq!(report.remaining, Some(0));
        assert_eq!(report.synced, 1);
        assert_eq!(*sink.batches.borrow(), vec![1]);
        assert!(check_limit(&ctx.config).is_err());
    }

    #[test]
    fn unmetered_without_endpoint_only_caches() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, Config::default());
        let sink = RecordingSink::default();

        for message in ["one", "two", "three", "four"] {
            track(&mut ctx, record(message), &sink).unwrap();
        }

        assert_eq!(cached_count(&ctx).unwrap(), 4);
        assert!(sink.batches.borrow().is_empty());
        assert_eq!(ctx.config.limit, None);
    }

    #[test]
    fn force_sync_sends_everything() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, Config::default());
        track(&mut ctx, record("one"), &RecordingSink::default()).unwrap();
        let sink = RecordingSink::default();

        assert_eq!(force_sync(&ctx, &sink).unwrap(), 1);
        assert_eq!(cached_count(&ctx).unwrap(), 0);
        assert_eq!(force_sync(&ctx, &sink).unwrap(), 0);
    }

    #[test]
    fn record_serialises_with_wire_names() {
        let value = serde_json::to_value(record("fix: x")).unwrap();
        assert_eq!(value["commitMessage"], "fix: x");
        assert_eq!(value["status"], "success");
        assert_eq!(value["requestDetails"]["userInput"], "push");
        assert_eq!(value["requestDetails"]["responseMimeType"], "application/json");
    }

    #[test]
    fn http_sink_requires_endpoint() {
        let err = HttpSink.send(&Config::default(), &[]).unwrap_err();
        assert!(err.to_string().contains("no usage endpoint"));
    }
}

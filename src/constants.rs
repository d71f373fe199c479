// git
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Auto commit";
pub const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 120;

// ui
pub const MAX_FILES_TO_SHOW: usize = 5;
pub const LOW_LIMIT_WARNING: u32 = 10;

// intent
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const INTENT_TIMEOUT_SECS: u64 = 30;

// usage
pub const USAGE_BATCH_SIZE: usize = 3;
pub const USAGE_SYNC_TIMEOUT_SECS: u64 = 15;

// env
pub const API_KEY_ENV_VARS: [&str; 2] = ["GITPUSHER_API_KEY", "GEMINI_API_KEY"];
pub const MODEL_ENV_VAR: &str = "GITPUSHER_MODEL";

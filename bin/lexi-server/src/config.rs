//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where translation tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskBackendKind {
    /// Supervised tokio tasks inside the server; in-memory stores.
    InProcess,
    /// Durable `jobs` table consumed by `lexi-server worker`; SQL stores.
    Queue,
}

impl FromStr for TaskBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inprocess" | "in-process" | "memory" => Ok(Self::InProcess),
            "queue" | "durable" => Ok(Self::Queue),
            other => Err(format!("unknown task backend '{other}'")),
        }
    }
}

/// Runtime configuration for lexi-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`).
    pub bind_address: String,

    /// sqlx SQLite URL used in queue mode (default: `"sqlite://lexi.db"`).
    pub database_url: String,

    pub task_backend: TaskBackendKind,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated CORS origins; unset means any origin.
    pub cors_allowed_origins: Option<String>,

    /// `genai` model name (default: `"gemini-1.5-flash"`).
    pub llm_model: String,
    pub llm_timeout: Duration,

    /// Deadline for a whole translation task.
    pub task_timeout: Duration,

    /// Concurrent per-language calls within one task.
    pub translate_concurrency: usize,

    /// In-memory task records kept before finished ones are evicted.
    pub max_tasks: usize,

    /// History entries kept per user; `0` keeps everything.
    pub max_history_per_user: usize,

    pub tts_cache_dir: PathBuf,
    pub tts_language: String,

    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,

    /// Run a queue worker inside the server process (queue mode only).
    pub embedded_worker: bool,
    pub worker_poll_interval: Duration,
    /// Claims older than this are handed to another worker.
    pub worker_stale_after: Duration,

    /// How long shutdown waits for in-flight in-process tasks.
    pub shutdown_grace: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_source(var: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            bind_address: env_or(var, "LEXI_BIND", "0.0.0.0:5000"),
            database_url: env_or(var, "LEXI_DATABASE_URL", "sqlite://lexi.db"),
            task_backend: parse_env(var, "LEXI_TASK_BACKEND", TaskBackendKind::InProcess),
            log_level: env_or(var, "LEXI_LOG", "info"),
            log_json: flag(var, "LEXI_LOG_JSON"),
            log_dir: var("LEXI_LOG_DIR").filter(|v| !v.is_empty()).map(PathBuf::from),
            cors_allowed_origins: var("LEXI_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            llm_model: env_or(var, "LEXI_LLM_MODEL", "gemini-1.5-flash"),
            llm_timeout: Duration::from_secs(parse_env(var, "LEXI_LLM_TIMEOUT_SECS", 60)),
            task_timeout: Duration::from_secs(parse_env(var, "LEXI_TASK_TIMEOUT_SECS", 600)),
            translate_concurrency: parse_env(var, "LEXI_TRANSLATE_CONCURRENCY", 4),
            max_tasks: parse_env(var, "LEXI_MAX_TASKS", 10_000),
            max_history_per_user: parse_env(var, "LEXI_MAX_HISTORY_PER_USER", 200),
            tts_cache_dir: PathBuf::from(env_or(var, "LEXI_TTS_CACHE_DIR", "tts_cache")),
            tts_language: env_or(var, "LEXI_TTS_LANGUAGE", "en"),
            max_upload_bytes: parse_env::<usize>(var, "LEXI_MAX_UPLOAD_MB", 20) * 1024 * 1024,
            embedded_worker: flag(var, "LEXI_EMBEDDED_WORKER"),
            worker_poll_interval: Duration::from_millis(parse_env(var, "LEXI_WORKER_POLL_MS", 500)),
            worker_stale_after: Duration::from_secs(parse_env(var, "LEXI_WORKER_STALE_SECS", 900)),
            shutdown_grace: Duration::from_secs(parse_env(var, "LEXI_SHUTDOWN_GRACE_SECS", 30)),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(var: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_owned())
}

fn parse_env<T: FromStr>(var: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn flag(var: &dyn Fn(&str) -> Option<String>, key: &str) -> bool {
    var(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_source(&|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]);
        assert_eq!(cfg.task_backend, TaskBackendKind::InProcess);
        assert_eq!(cfg.llm_model, "gemini-1.5-flash");
        assert_eq!(cfg.max_history_per_user, 200);
        assert!(!cfg.embedded_worker);
        assert!(cfg.cors_allowed_origins.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("LEXI_TASK_BACKEND", "Queue"),
            ("LEXI_EMBEDDED_WORKER", "true"),
            ("LEXI_TASK_TIMEOUT_SECS", "5"),
            ("LEXI_MAX_UPLOAD_MB", "1"),
        ]);
        assert_eq!(cfg.task_backend, TaskBackendKind::Queue);
        assert!(cfg.embedded_worker);
        assert_eq!(cfg.task_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_upload_bytes, 1024 * 1024);
    }

    #[test]
    fn invalid_numbers_fall_back_to_default() {
        let cfg = config(&[("LEXI_MAX_TASKS", "lots"), ("LEXI_TASK_BACKEND", "kafka")]);
        assert_eq!(cfg.max_tasks, 10_000);
        assert_eq!(cfg.task_backend, TaskBackendKind::InProcess);
    }
}

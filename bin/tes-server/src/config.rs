//! Server configuration, loaded from environment variables at startup.

use tes_core::normalize::{BootDiskGbOptions, DiskGbOptions, GpuOptions};
use tes_core::{NormalizeOptions, RetryPolicy};

/// Runtime configuration for tes-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://tes.db"`).
    pub database_url: String,

    /// Upper bound on pooled database connections.
    pub db_max_connections: u32,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated CORS origin allow-list; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    pub retry: RetryPolicy,

    pub normalize: NormalizeOptions,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let retry = RetryPolicy::default();
        let normalize = NormalizeOptions::default();
        Self {
            bind_address: env_or(&get, "TES_BIND", "0.0.0.0:8080"),
            database_url: env_or(&get, "TES_DATABASE_URL", "sqlite://tes.db"),
            db_max_connections: parse_env(&get, "TES_DB_MAX_CONNECTIONS", 8),
            log_level: env_or(&get, "TES_LOG", "info"),
            log_json: bool_env(&get, "TES_LOG_JSON", false),
            cors_allowed_origins: get("TES_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            retry: RetryPolicy {
                max_id_attempts: parse_env(&get, "TES_MAX_ID_ATTEMPTS", retry.max_id_attempts),
                max_update_attempts: parse_env(
                    &get,
                    "TES_MAX_UPDATE_ATTEMPTS",
                    retry.max_update_attempts,
                ),
            },
            normalize: NormalizeOptions {
                executor_base_path: env_or(
                    &get,
                    "TES_EXECUTOR_BASE_PATH",
                    &normalize.executor_base_path,
                ),
                disk_gb: DiskGbOptions {
                    enable: bool_env(&get, "TES_DISKGB_ENABLE", normalize.disk_gb.enable),
                    min: parse_env(&get, "TES_DISKGB_MIN", normalize.disk_gb.min),
                    max: parse_env(&get, "TES_DISKGB_MAX", normalize.disk_gb.max),
                    is_integer: bool_env(&get, "TES_DISKGB_INTEGER", normalize.disk_gb.is_integer),
                },
                boot_disk_gb: BootDiskGbOptions {
                    enable: bool_env(&get, "TES_BOOTDISKGB_ENABLE", normalize.boot_disk_gb.enable),
                    min: parse_env(&get, "TES_BOOTDISKGB_MIN", normalize.boot_disk_gb.min),
                    max: parse_env(&get, "TES_BOOTDISKGB_MAX", normalize.boot_disk_gb.max),
                },
                gpu: GpuOptions {
                    enable: bool_env(&get, "TES_GPU_ENABLE", normalize.gpu.enable),
                    is_integer: bool_env(&get, "TES_GPU_INTEGER", normalize.gpu.is_integer),
                },
            },
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get(key).unwrap_or_else(|| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn bool_env(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    get(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::observability::LogFormat;

/// Bundle service configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "bundlr")]
#[command(about = "Rule repository, policy bundle server and decision replay service")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8181", env = "BUNDLR_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "BUNDLR_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// YAML file of rules loaded into the store at startup (optional)
    #[arg(long, env = "BUNDLR_SEED_RULES")]
    pub seed_rules: Option<PathBuf>,

    /// Directory of static policy modules (embedded modules are used if not set)
    #[arg(long, env = "BUNDLR_STATIC_POLICY_DIR")]
    pub static_policy_dir: Option<PathBuf>,

    /// Upper bound in milliseconds for one compile, serialize or evaluate call
    #[arg(long, default_value = "10000", env = "BUNDLR_BUILD_TIMEOUT_MS")]
    pub build_timeout_ms: u64,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "BUNDLR_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value = "30", env = "BUNDLR_SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Get build timeout as Duration.
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    /// Get shutdown timeout as Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8181".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            seed_rules: None,
            static_policy_dir: None,
            build_timeout_ms: 10_000,
            graceful_shutdown: true,
            shutdown_timeout_secs: 30,
        }
    }
}

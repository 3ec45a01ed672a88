use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Per-call send timeout bounds (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 30_000;

/// Rate-limit pause bounds (milliseconds): default 20 minutes, within [1 minute, 1 hour].
pub const DEFAULT_RETRY_DELAY_MS: u64 = 20 * 60 * 1_000;
pub const MIN_RETRY_DELAY_MS: u64 = 60_000;
pub const MAX_RETRY_DELAY_MS: u64 = 3_600_000;

/// Clamp an operator-supplied send timeout; `None` means "use the default".
pub fn clamp_timeout_ms(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_TIMEOUT_MS)
        .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)
}

/// Clamp an operator-supplied retry delay; `None` means "use the default".
pub fn clamp_retry_delay_ms(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_RETRY_DELAY_MS)
        .clamp(MIN_RETRY_DELAY_MS, MAX_RETRY_DELAY_MS)
}

/// Limits for the bounded scheduler (`[scheduler]` section in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of row units executing at once.
    pub concurrency: usize,
    /// Maximum number of unit starts within one interval window.
    pub interval_cap: usize,
    /// Length of the rolling start window in milliseconds.
    pub interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            interval_cap: 1,
            interval_ms: 4_000,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Where the messaging/identity gateway lives (`[provider]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the HTTP gateway, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// Optional bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            token: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_templates() -> Vec<String> {
    vec![
        "Hello {name}, we would like to briefly introduce a service that may suit you.".to_string(),
        "Hi {name}! Are you currently looking for tools to support your online business?".to_string(),
        "Hello {name}, we are reaching out to share a short piece of useful news.".to_string(),
        "Hi {name}, we have a new support program and would love to talk if you have a moment.".to_string(),
        "Hello {name}, this is customer support. May we send you a short update?".to_string(),
    ]
}

/// Global configuration loaded from `~/.config/outreach/config.toml`.
/// Missing keys take their default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutreachConfig {
    pub scheduler: SchedulerConfig,
    /// Flush the dataset after this many dispatched rows.
    pub checkpoint_interval: usize,
    /// Poll interval of the pause wait, used only for the time-based auto-resume check.
    pub pause_poll_ms: u64,
    /// Default per-call send timeout for new runs.
    pub default_timeout_ms: u64,
    /// Default rate-limit pause for new runs.
    pub default_retry_delay_ms: u64,
    /// Directory holding run inputs and result datasets (None = XDG data dir).
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
    /// Message templates; `{name}` is replaced with the resolved display name.
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            checkpoint_interval: 5,
            pause_poll_ms: 500,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            default_retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            uploads_dir: None,
            templates: default_templates(),
            provider: ProviderConfig::default(),
        }
    }
}

impl OutreachConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.concurrency == 0 || self.scheduler.interval_cap == 0 {
            anyhow::bail!("scheduler.concurrency and scheduler.interval_cap must be at least 1");
        }
        if self.checkpoint_interval == 0 {
            anyhow::bail!("checkpoint_interval must be at least 1");
        }
        if self.templates.iter().all(|t| t.trim().is_empty()) {
            anyhow::bail!("at least one non-empty message template is required");
        }
        Ok(())
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }

    /// Directory for run inputs and result datasets.
    pub fn uploads_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.uploads_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("outreach")?;
        Ok(xdg_dirs.get_data_home().join("uploads"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("outreach")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<OutreachConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = OutreachConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: OutreachConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::state::SweepPolicy;
use crate::tab::EphemeralTabOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub tabs: TabsConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub sites: SitesConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "gator_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses ~/.gator/logs.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts for a transcript page.
    #[serde(default = "default_transcript_max_attempts")]
    pub transcript_max_attempts: u32,

    /// Attempts for assignment list/detail pages and the inbox.
    #[serde(default = "default_page_max_attempts")]
    pub page_max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_transcript_max_attempts() -> u32 {
    5
}

fn default_page_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transcript_max_attempts: default_transcript_max_attempts(),
            page_max_attempts: default_page_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn transcript_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.transcript_max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }

    pub fn page_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.page_max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabsConfig {
    /// Budget for a transcript page opened from a known URL.
    #[serde(default = "default_transcript_timeout_ms")]
    pub transcript_timeout_ms: u64,

    /// Budget for a discovery page (assignment index, inbox) including its nested work.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// Budget per assignment detail page.
    #[serde(default = "default_detail_timeout_ms")]
    pub detail_timeout_ms: u64,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Wait after clicking the transcript control.
    #[serde(default = "default_activation_settle_ms")]
    pub activation_settle_ms: u64,

    #[serde(default = "default_restore_origin")]
    pub restore_origin: bool,
}

fn default_transcript_timeout_ms() -> u64 {
    45_000
}

fn default_discovery_timeout_ms() -> u64 {
    180_000
}

fn default_detail_timeout_ms() -> u64 {
    10_000
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_activation_settle_ms() -> u64 {
    1500
}

fn default_restore_origin() -> bool {
    true
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            transcript_timeout_ms: default_transcript_timeout_ms(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            detail_timeout_ms: default_detail_timeout_ms(),
            settle_ms: default_settle_ms(),
            activation_settle_ms: default_activation_settle_ms(),
            restore_origin: default_restore_origin(),
        }
    }
}

impl TabsConfig {
    fn options(&self, timeout_ms: u64) -> EphemeralTabOptions {
        EphemeralTabOptions {
            timeout: Duration::from_millis(timeout_ms),
            settle: Duration::from_millis(self.settle_ms),
            restore_origin: self.restore_origin,
        }
    }

    pub fn transcript_options(&self) -> EphemeralTabOptions {
        self.options(self.transcript_timeout_ms)
    }

    pub fn discovery_options(&self) -> EphemeralTabOptions {
        self.options(self.discovery_timeout_ms)
    }

    /// Nested tabs never move the user's tab.
    pub fn detail_options(&self) -> EphemeralTabOptions {
        EphemeralTabOptions {
            restore_origin: false,
            ..self.options(self.detail_timeout_ms)
        }
    }

    pub fn activation_settle(&self) -> Duration {
        Duration::from_millis(self.activation_settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON file per task. If unset, uses ~/.gator/tasks.
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_completed_retention_secs")]
    pub completed_retention_secs: u64,

    #[serde(default = "default_abandoned_after_secs")]
    pub abandoned_after_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_completed_retention_secs() -> u64 {
    2 * 60 * 60
}

fn default_abandoned_after_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            completed_retention_secs: default_completed_retention_secs(),
            abandoned_after_secs: default_abandoned_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl StoreConfig {
    pub fn sweep_policy(&self) -> SweepPolicy {
        SweepPolicy {
            completed_retention: chrono::Duration::seconds(self.completed_retention_secs as i64),
            abandoned_after: chrono::Duration::seconds(self.abandoned_after_secs as i64),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesConfig {
    /// Host suffix of the learning-management site.
    #[serde(default = "default_lms_host")]
    pub lms_host: String,

    /// Host suffixes accepted for recording playback pages.
    #[serde(default = "default_recording_hosts")]
    pub recording_hosts: Vec<String>,

    /// Rewrite a course URL to its assignments section instead of failing.
    #[serde(default = "default_auto_navigate")]
    pub auto_navigate: bool,
}

fn default_lms_host() -> String {
    "instructure.com".to_string()
}

fn default_recording_hosts() -> Vec<String> {
    vec!["zoom.us".to_string()]
}

fn default_auto_navigate() -> bool {
    true
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            lms_host: default_lms_host(),
            recording_hosts: default_recording_hosts(),
            auto_navigate: default_auto_navigate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_backend_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_token: String,

    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_assignments_path")]
    pub assignments_path: String,

    #[serde(default = "default_recordings_path")]
    pub recordings_path: String,

    #[serde(default = "default_transcript_path")]
    pub transcript_path: String,
}

fn default_backend_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_backend_timeout_ms() -> u64 {
    30_000
}

fn default_assignments_path() -> String {
    "/assignments/store".to_string()
}

fn default_recordings_path() -> String {
    "/zoom/store".to_string()
}

fn default_transcript_path() -> String {
    "/zoom/store-transcript".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_backend_url(),
            api_token: String::new(),
            timeout_ms: default_backend_timeout_ms(),
            assignments_path: default_assignments_path(),
            recordings_path: default_recordings_path(),
            transcript_path: default_transcript_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.tabs.transcript_timeout_ms, 45_000);
        assert_eq!(cfg.tabs.discovery_timeout_ms, 180_000);
        assert_eq!(cfg.retry.transcript_max_attempts, 5);
        assert_eq!(cfg.retry.page_max_attempts, 3);
        assert_eq!(cfg.store.completed_retention_secs, 7200);
        assert_eq!(cfg.sites.recording_hosts, vec!["zoom.us".to_string()]);
        assert!(!cfg.backend.enabled);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [tabs]
            settle_ms = 0

            [sites]
            lms_host = "canvas.school.edu"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tabs.settle_ms, 0);
        assert_eq!(cfg.tabs.activation_settle_ms, 1500);
        assert_eq!(cfg.sites.lms_host, "canvas.school.edu");
        assert!(cfg.sites.auto_navigate);
    }

    #[test]
    fn detail_tabs_never_restore_origin() {
        let tabs = TabsConfig::default();
        assert!(tabs.transcript_options().restore_origin);
        assert!(!tabs.detail_options().restore_origin);
        assert_eq!(tabs.detail_options().timeout, Duration::from_secs(10));
    }
}

use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default gator data directory: ~/.gator
pub fn get_gator_data_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".gator"))
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))
}

fn is_unset(v: &Option<String>) -> bool {
    v.as_ref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a config file without touching the filesystem layout.
pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.gator/config.toml (highest)
    let gator_dir = get_gator_data_dir()?;
    let gator_config = gator_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = if gator_config.exists() {
        load_from_path(&gator_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    if is_unset(&cfg.logging.directory) {
        let logs_dir = gator_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    if is_unset(&cfg.store.directory) {
        cfg.store.directory = Some(gator_dir.join("tasks").to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Environment variable overrides (Priority 0: highest)
pub fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Some(v) = env_override("GATOR_BACKEND_URL") {
        cfg.backend.base_url = v;
        cfg.backend.enabled = true;
    }
    if let Some(v) = env_override("GATOR_API_TOKEN") {
        cfg.backend.api_token = v;
    }
    if let Some(v) = env_override("GATOR_LMS_HOST") {
        cfg.sites.lms_host = v;
    }
    if let Some(v) = env_override("GATOR_LOG") {
        cfg.logging.level = v;
    }
}

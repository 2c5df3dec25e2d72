//! CLI-side wrappers over `ferry_config`: profile lookup with actionable
//! errors and per-command overrides of the engine settings.

use std::time::Duration;

use ferry_config::Config;
use ferry_core::{ApiClient, SyncConfig, SyncMode};

use crate::error::CliError;

pub use ferry_config::{config_path, load_config};

/// Build an authenticated client for the named profile.
pub fn client_for(cfg: &Config, name: &str) -> Result<ApiClient, CliError> {
    let (name, profile) = cfg
        .profile(Some(name))
        .map_err(|_| profile_not_found(cfg, name))?;
    tracing::debug!(profile = name, api_url = %profile.api_url, "building client");
    Ok(ferry_config::profile_client(cfg, profile, name)?)
}

fn profile_not_found(cfg: &Config, name: &str) -> CliError {
    let available: Vec<_> = cfg.profiles.keys().cloned().collect();
    CliError::ProfileNotFound {
        name: name.into(),
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
        path: config_path().display().to_string(),
    }
}

/// Engine settings from `[defaults]`, with command-line overrides applied.
pub fn sync_config(
    cfg: &Config,
    mode: SyncMode,
    tag: Option<&str>,
    delay_ms: Option<u64>,
) -> SyncConfig {
    let mut sync = cfg.sync_config(mode);
    if let Some(tag) = tag {
        sync = sync.with_tag_name(tag);
    }
    if let Some(ms) = delay_ms {
        sync = sync.with_item_delay(Duration::from_millis(ms));
    }
    sync
}

//! Shared configuration for the ferry CLI.
//!
//! TOML profiles (one per platform account), token resolution
//! (env var + plaintext), and translation to the engine's
//! `TransportConfig` / `SyncConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ferry_api::TlsMode;
use ferry_core::{ApiClient, SyncConfig, SyncMode, TransportConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}' in {path}")]
    UnknownProfile { profile: String, path: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("failed to build API client for profile '{profile}': {source}")]
    Client {
        profile: String,
        #[source]
        source: ferry_api::Error,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when a command names none.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named platform accounts.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Tag key used to correlate exported entities.
    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            item_delay_ms: default_item_delay_ms(),
            timeout: default_timeout(),
        }
    }
}

fn default_tag() -> String {
    "export_id".into()
}
fn default_item_delay_ms() -> u64 {
    200
}
fn default_timeout() -> u64 {
    30
}

/// A named platform account.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// API base URL (e.g., "https://api.example-platform.io").
    pub api_url: String,

    /// Account token (plaintext; prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable holding the account token.
    pub token_env: Option<String>,

    /// Extra CA certificate for self-hosted deployments.
    pub ca_cert: Option<PathBuf>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| ConfigError::Validation {
                field: "profile".into(),
                reason: "no profile given and no default_profile configured".into(),
            })?;
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
                path: config_path().display().to_string(),
            })?;
        Ok((name, profile))
    }

    /// Engine settings for a run, from `[defaults]`.
    pub fn sync_config(&self, mode: SyncMode) -> SyncConfig {
        SyncConfig::default()
            .with_mode(mode)
            .with_tag_name(self.defaults.tag.clone())
            .with_item_delay(Duration::from_millis(self.defaults.item_delay_ms))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "ferry", "ferry").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ferry");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// `FERRY_`-prefixed variables override file values; nested keys use a
/// double underscore (`FERRY_DEFAULTS__ITEM_DELAY_MS=0`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FERRY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a profile's token: `token_env` variable, then plaintext `token`.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Transport settings for a profile, with its timeout override applied.
pub fn transport_for(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    let mut transport = TransportConfig::default()
        .with_timeout(Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)));
    if let Some(ref ca) = profile.ca_cert {
        transport.tls = TlsMode::CustomCa(ca.clone());
    }
    transport
}

/// Build an authenticated client for a profile.
pub fn profile_client(
    config: &Config,
    profile: &Profile,
    profile_name: &str,
) -> Result<ApiClient, ConfigError> {
    url::Url::parse(&profile.api_url).map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {}", profile.api_url),
    })?;

    let token = resolve_token(profile, profile_name)?;
    let transport = transport_for(profile, &config.defaults);
    ApiClient::new(&profile.api_url, &token, &transport).map_err(|source| ConfigError::Client {
        profile: profile_name.into(),
        source,
    })
}

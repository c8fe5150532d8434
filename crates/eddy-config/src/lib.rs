//! Shared configuration for eddy gateway clients.
//!
//! TOML profiles layered with `EDDY_*` environment overrides, and
//! translation to `eddy_api::ClientConfig` / `TransportConfig`. The
//! generated operation metadata is a codegen artifact, not a config
//! concern -- attach it after translation with
//! [`ClientConfig::with_metadata`](eddy_api::ClientConfig::with_metadata).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use eddy_api::ClientConfig;
use eddy_api::transport::{TlsMode, TransportConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{name}' in configuration")]
    NoProfile { name: String },

    #[error("no profiles configured and no default profile set")]
    NoDefaultProfile,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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
    /// Profile used when the caller doesn't name one.
    pub default_profile: Option<String>,

    /// Global defaults applied to every profile.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Defaults a profile can override field-by-field.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    pub timeout_secs: u64,
    pub csrf_enabled: bool,
    pub tls: TlsSetting,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            csrf_enabled: true,
            tls: TlsSetting::SystemDefaults,
        }
    }
}

/// One gateway connection profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway root URL, e.g. `http://localhost:9991`.
    pub url: Url,

    /// Build hash of the deployed gateway, if pinned.
    pub application_hash: Option<String>,

    pub csrf_enabled: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub tls: Option<TlsSetting>,

    /// Auth providers this gateway exposes.
    #[serde(default)]
    pub auth_providers: Vec<String>,
}

/// TLS verification strategy, as written in config files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsSetting {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed local gateways).
    DangerAcceptInvalid,
}

impl From<TlsSetting> for TlsMode {
    fn from(tls: TlsSetting) -> Self {
        match tls {
            TlsSetting::SystemDefaults => TlsMode::System,
            TlsSetting::CustomCa(path) => TlsMode::CustomCa(path),
            TlsSetting::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────

impl Config {
    /// Default config file location (`<config dir>/eddy/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "eddy-rs", "eddy").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration: built-in defaults, then the TOML file (the
    /// given path or the default location), then `EDDY_*` environment
    /// overrides (`EDDY_DEFAULT_PROFILE`, `EDDY_PROFILES__LOCAL__URL`, ...).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match path {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(default) = Self::default_path() {
                    figment = figment.merge(Toml::file(default));
                }
            }
        }

        figment = figment.merge(Env::prefixed("EDDY_").split("__"));
        Ok(figment.extract()?)
    }

    /// Write this configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    // ── Profile resolution ───────────────────────────────────────────

    /// Resolve a profile: the named one, else the default profile, else
    /// the sole configured profile.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        if let Some(name) = name.or(self.default_profile.as_deref()) {
            return self
                .profiles
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| ConfigError::NoProfile { name: name.into() });
        }

        if self.profiles.len() == 1 {
            if let Some((k, v)) = self.profiles.iter().next() {
                return Ok((k.as_str(), v));
            }
        }
        Err(ConfigError::NoDefaultProfile)
    }

    // ── Translation ──────────────────────────────────────────────────

    /// Build the `eddy_api::ClientConfig` for a profile.
    pub fn client_config(&self, name: Option<&str>) -> Result<ClientConfig, ConfigError> {
        let (profile_name, profile) = self.profile(name)?;

        match profile.url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::Validation {
                    field: format!("profiles.{profile_name}.url"),
                    reason: format!("unsupported scheme '{other}'"),
                });
            }
        }

        let mut config = ClientConfig::new(profile.url.clone()).with_csrf(
            profile.csrf_enabled.unwrap_or(self.defaults.csrf_enabled),
        );
        if let Some(ref hash) = profile.application_hash {
            config = config.with_application_hash(hash.clone());
        }
        for provider in &profile.auth_providers {
            config = config.with_auth_provider(provider.clone());
        }
        Ok(config)
    }

    /// Build the `TransportConfig` for a profile.
    pub fn transport_config(&self, name: Option<&str>) -> Result<TransportConfig, ConfigError> {
        let (_, profile) = self.profile(name)?;
        let tls = profile.tls.clone().unwrap_or(self.defaults.tls.clone());
        let timeout_secs = profile.timeout_secs.unwrap_or(self.defaults.timeout_secs);

        Ok(TransportConfig {
            tls: tls.into(),
            timeout: Duration::from_secs(timeout_secs),
            cookie_jar: None,
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

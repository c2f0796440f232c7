//! Shared configuration for Intelbras tools.
//!
//! TOML profiles, password resolution (env + plaintext), and translation
//! to `intelbras_core::DeviceConfig`. The CLI layers its flag overrides
//! on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use intelbras_core::{DeviceConfig, TlsVerification};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Environment variable consulted for the password when the profile
/// names none of its own.
pub const PASSWORD_ENV: &str = "INTELBRAS_PASSWORD";
pub const USERNAME_ENV: &str = "INTELBRAS_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

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
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name.to_owned(), p))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Verify the device TLS certificate. Off by default; devices ship
    /// self-signed certificates.
    #[serde(default)]
    pub verify_tls: bool,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Event fetch timeout inside a poll cycle (seconds).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,

    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            verify_tls: false,
            timeout: default_timeout(),
            fetch_timeout: default_fetch_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_timeout() -> u64 {
    20
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    intelbras_core::config::DEFAULT_POLL_INTERVAL_SECS
}
fn default_channel() -> u32 {
    1
}

/// A named device profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Device address: bare host (`192.168.1.201`) or full URL.
    pub host: String,

    pub username: Option<String>,

    /// Password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Door channel for open/status commands.
    #[serde(default = "default_channel")]
    pub channel: u32,

    /// Identifier stamped on published events. Defaults to the host.
    pub device_id: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override TLS verification.
    pub verify_tls: Option<bool>,

    /// Override request timeout.
    pub timeout: Option<u64>,

    /// Override fetch timeout.
    pub fetch_timeout: Option<u64>,

    /// Override poll interval.
    pub poll_interval: Option<u64>,
}

impl Profile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: None,
            password: None,
            password_env: None,
            channel: default_channel(),
            device_id: None,
            ca_cert: None,
            verify_tls: None,
            timeout: None,
            fetch_timeout: None,
            poll_interval: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "intelbras", "intelbras").map_or_else(
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
    p.push("intelbras");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + environment.
///
/// Nested keys come from `INTELBRAS_` variables split on `__`, e.g.
/// `INTELBRAS_DEFAULTS__POLL_INTERVAL=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("INTELBRAS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the username: profile, then `INTELBRAS_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    resolve_username_with(profile, profile_name, |key| std::env::var(key).ok())
}

/// Resolve the password: `password_env`, then `INTELBRAS_PASSWORD`, then
/// plaintext in the profile.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(profile, profile_name, |key| std::env::var(key).ok())
}

fn resolve_username_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| env(USERNAME_ENV))
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. Well-known env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Turn a profile `host` into a device base URL. Bare hosts get `http://`.
pub fn host_url(host: &str) -> Result<Url, ConfigError> {
    let host = host.trim();
    let candidate = if host.contains("://") {
        host.to_owned()
    } else {
        format!("http://{host}")
    };
    let url = Url::parse(&candidate).map_err(|e| ConfigError::Validation {
        field: "host".into(),
        reason: format!("invalid address '{host}': {e}"),
    })?;
    if url.host_str().is_none() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("'{host}' has no host name"),
        });
    }
    Ok(url)
}

/// Build a `DeviceConfig` from a profile and global defaults, with no CLI
/// flag overrides.
pub fn profile_to_device_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    let url = host_url(&profile.host)?;
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;

    let mut config = DeviceConfig::new(url, username, password);
    config.tls = tls_for(profile, defaults);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.fetch_timeout =
        Duration::from_secs(profile.fetch_timeout.unwrap_or(defaults.fetch_timeout));
    config.poll_interval_secs = profile.poll_interval.unwrap_or(defaults.poll_interval);
    config.channel = profile.channel;
    config.device_id.clone_from(&profile.device_id);

    config.validate().map_err(|e| ConfigError::Validation {
        field: format!("profile '{profile_name}'"),
        reason: e.to_string(),
    })?;
    Ok(config)
}

fn tls_for(profile: &Profile, defaults: &Defaults) -> TlsVerification {
    if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if profile.verify_tls.unwrap_or(defaults.verify_tls) {
        TlsVerification::SystemDefaults
    } else {
        TlsVerification::DangerAcceptInvalid
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn profile() -> Profile {
        Profile {
            username: Some("admin".into()),
            password: Some("plain".into()),
            ..Profile::new("192.168.1.201")
        }
    }

    #[test]
    fn load_merges_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "gate"

[defaults]
poll_interval = 60

[profiles.gate]
host = "10.0.0.9"
username = "admin"
password_env = "GATE_PASSWORD"
channel = 2
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.defaults.poll_interval, 60);
        assert_eq!(config.defaults.timeout, 20);

        let (name, gate) = config.profile(None).unwrap();
        assert_eq!(name, "gate");
        assert_eq!(gate.host, "10.0.0.9");
        assert_eq!(gate.channel, 2);
        assert_eq!(gate.password_env.as_deref(), Some("GATE_PASSWORD"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
        assert!(matches!(
            config.profile(None),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert("default".into(), profile());
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (_, p) = loaded.profile(Some("default")).unwrap();
        assert_eq!(p.host, "192.168.1.201");
        assert_eq!(p.username.as_deref(), Some("admin"));
    }

    #[test]
    fn password_resolution_order() {
        let mut p = profile();
        p.password_env = Some("FRONT_DOOR_PW".into());

        let env = |key: &str| match key {
            "FRONT_DOOR_PW" => Some("from-profile-env".to_owned()),
            PASSWORD_ENV => Some("from-global-env".to_owned()),
            _ => None,
        };
        let pw = resolve_password_with(&p, "default", env).unwrap();
        assert_eq!(pw.expose_secret(), "from-profile-env");

        let env = |key: &str| (key == PASSWORD_ENV).then(|| "from-global-env".to_owned());
        let pw = resolve_password_with(&p, "default", env).unwrap();
        assert_eq!(pw.expose_secret(), "from-global-env");

        let pw = resolve_password_with(&p, "default", no_env).unwrap();
        assert_eq!(pw.expose_secret(), "plain");

        p.password = None;
        assert!(matches!(
            resolve_password_with(&p, "default", no_env),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn username_falls_back_to_env() {
        let mut p = profile();
        p.username = None;
        let env = |key: &str| (key == USERNAME_ENV).then(|| "operator".to_owned());
        assert_eq!(resolve_username_with(&p, "default", env).unwrap(), "operator");
        assert!(resolve_username_with(&p, "default", no_env).is_err());
    }

    #[test]
    fn host_url_accepts_bare_hosts() {
        assert_eq!(
            host_url("192.168.1.201").unwrap().as_str(),
            "http://192.168.1.201/"
        );
        assert_eq!(
            host_url("https://door.local:8443").unwrap().as_str(),
            "https://door.local:8443/"
        );
        assert!(host_url("http://").is_err());
    }

    #[test]
    fn tls_choice() {
        let defaults = Defaults::default();
        let mut p = profile();
        assert_eq!(tls_for(&p, &defaults), TlsVerification::DangerAcceptInvalid);

        p.verify_tls = Some(true);
        assert_eq!(tls_for(&p, &defaults), TlsVerification::SystemDefaults);

        p.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        assert_eq!(
            tls_for(&p, &defaults),
            TlsVerification::CustomCa(PathBuf::from("/etc/ca.pem"))
        );
    }

    #[test]
    fn poll_interval_out_of_range_is_rejected() {
        let mut p = profile();
        p.poll_interval = Some(1);
        let defaults = Defaults::default();
        let err = profile_to_device_config(&p, "default", &defaults);
        assert!(matches!(err, Err(ConfigError::Validation { .. })));
    }
}

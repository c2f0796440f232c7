//! CLI configuration -- thin wrapper around `intelbras_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--host, --password, etc.).

use secrecy::SecretString;

use intelbras_core::DeviceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use intelbras_config::{Config, Profile, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `DeviceConfig` from the config file, the active profile, and
/// CLI overrides. Flags take priority over profile values.
///
/// Without a matching profile, `--host` alone is enough provided the
/// credentials come from flags or the environment.
pub fn resolve_device_config(global: &GlobalOpts) -> Result<DeviceConfig, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None => {
            if global.profile.is_some() {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: available_profiles(&cfg),
                });
            }
            let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            Profile::new(host)
        }
    };

    apply_overrides(&mut profile, global);

    let mut device =
        intelbras_config::profile_to_device_config(&profile, &profile_name, &cfg.defaults)?;
    // --password beats password_env and INTELBRAS_PASSWORD.
    if let Some(ref password) = global.password {
        device.password = SecretString::from(password.clone());
    }
    tracing::debug!(profile = %profile_name, url = %device.url, "resolved device config");
    Ok(device)
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(ref password) = global.password {
        profile.password = Some(password.clone());
    }
    if let Some(channel) = global.channel {
        profile.channel = channel;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if let Some(interval) = global.poll_interval {
        profile.poll_interval = Some(interval);
    }
    if global.insecure {
        profile.verify_tls = Some(false);
        profile.ca_cert = None;
    }
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
}

// ── Runtime device configuration ──
//
// These types describe *how* to reach one access controller. They carry
// credentials and polling tuning but never touch disk; the CLI (or any
// other host) builds a `DeviceConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use intelbras_api::{Credentials, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const MAX_POLL_INTERVAL_SECS: u64 = 300;

/// Upper bound on a single event fetch, independent of the HTTP timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Default, since controllers ship self-signed certs.
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    fn to_tls_mode(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one access controller.
///
/// Built by the host, passed to [`Device`](crate::Device). Defaults are
/// resolved here once; nothing downstream re-reads them.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device base URL (e.g., `http://192.168.1.201`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Bound on one event fetch inside a poll cycle.
    pub fetch_timeout: Duration,
    /// Seconds between poll cycles, within
    /// [`MIN_POLL_INTERVAL_SECS`]..=[`MAX_POLL_INTERVAL_SECS`].
    pub poll_interval_secs: u64,
    /// Door channel for open/status commands.
    pub channel: u32,
    /// Identifier stamped on published events. Falls back to the host.
    pub device_id: Option<String>,
}

impl DeviceConfig {
    pub fn new(url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            url,
            username: username.into(),
            password,
            tls: TlsVerification::default(),
            timeout: intelbras_api::transport::DEFAULT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            channel: 1,
            device_id: None,
        }
    }

    /// Reject configurations the device context cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.username.trim().is_empty() {
            return Err(config_error("username must not be empty"));
        }
        if !matches!(self.url.scheme(), "http" | "https") {
            return Err(config_error(format!(
                "unsupported URL scheme '{}' (expected http or https)",
                self.url.scheme()
            )));
        }
        if self.url.host_str().is_none() {
            return Err(config_error(format!("URL '{}' has no host", self.url)));
        }
        if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&self.poll_interval_secs) {
            return Err(config_error(format!(
                "poll interval must be between {MIN_POLL_INTERVAL_SECS} and \
                 {MAX_POLL_INTERVAL_SECS} seconds, got {}",
                self.poll_interval_secs
            )));
        }
        if self.fetch_timeout.is_zero() || self.timeout.is_zero() {
            return Err(config_error("timeouts must be greater than zero"));
        }
        Ok(())
    }

    /// Identifier carried by every [`AccessEvent`](crate::AccessEvent).
    pub fn device_id(&self) -> String {
        match &self.device_id {
            Some(id) => id.clone(),
            None => self.url.host_str().unwrap_or_default().to_owned(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.to_tls_mode(),
            timeout: self.timeout,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

fn config_error(message: impl Into<String>) -> CoreError {
    CoreError::Config {
        message: message.into(),
    }
}

// ── Core error types ──
//
// User-facing errors from intelbras-core. Consumers never see reqwest
// errors or digest internals directly; the `From<intelbras_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Errors raised by [`EventLogParser`](crate::EventLogParser).
///
/// In lenient mode these are logged and the offending line or record is
/// skipped; in strict mode the first one aborts the parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed record line {line_number}: '{line}'")]
    MalformedRecordLine { line_number: usize, line: String },

    #[error("malformed found line {line_number}: '{line}'")]
    MalformedFoundLine { line_number: usize, line: String },

    #[error("missing record at index {index}")]
    MissingRecordIndex { index: usize },

    #[error("invalid value for numeric field {field} on line {line_number}: '{value}'")]
    InvalidFieldValue {
        field: String,
        value: String,
        line_number: usize,
    },

    #[error("event data is not valid text: {reason}")]
    NotText { reason: String },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Device is shut down")]
    Disconnected,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Event parse failed: {0}")]
    Parse(#[from] ParseError),

    // ── Polling ──────────────────────────────────────────────────────
    /// A poll cycle failed. The host scheduler decides when to retry.
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if this error came out of a poll cycle.
    pub fn is_update_failed(&self) -> bool {
        matches!(self, Self::UpdateFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<intelbras_api::Error> for CoreError {
    fn from(err: intelbras_api::Error) -> Self {
        match err {
            intelbras_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            intelbras_api::Error::Digest(e) => CoreError::AuthenticationFailed {
                message: e.to_string(),
            },
            // DeviceClient reports timeouts as `Error::Timeout` with its
            // configured budget; only connect and other failures arrive here.
            intelbras_api::Error::Transport(ref e) => {
                if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            intelbras_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            intelbras_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            intelbras_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            intelbras_api::Error::Http { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                status: Some(status),
            },
        }
    }
}

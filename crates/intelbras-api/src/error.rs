use thiserror::Error;

use crate::digest::DigestError;

/// Top-level error type for the `intelbras-api` crate.
///
/// Covers every failure mode of a device round trip: the digest
/// handshake, transport, and non-success HTTP statuses.
/// `intelbras-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The device rejected the request, or demanded auth without a
    /// usable Digest challenge.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The Digest challenge could not be answered (unsupported
    /// algorithm or qop, malformed header).
    #[error("Digest authentication failed: {0}")]
    Digest(#[from] DigestError),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Device ──────────────────────────────────────────────────────
    /// Non-success status returned by the device (after the digest retry).
    #[error("Device returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

impl Error {
    /// Returns `true` if retrying with the same credentials cannot help.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Digest(_))
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Authentication { .. } => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

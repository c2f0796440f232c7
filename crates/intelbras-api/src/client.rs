// Device HTTP client
//
// Wraps `reqwest::Client` with the device's challenge/response flow:
// every call goes out unauthenticated first, and a 401 carrying a
// Digest challenge is answered exactly once. Endpoint methods live in
// `endpoints.rs` to keep this module focused on transport mechanics.

use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use secrecy::ExposeSecret;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::Credentials;
use crate::digest::{self, DigestChallenge};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Longest body excerpt carried in errors and debug logs.
const BODY_PREVIEW_LEN: usize = 200;

/// Raw HTTP client for an Intelbras access controller.
///
/// Holds immutable credentials and a connection-less `reqwest::Client`;
/// safe to share behind an `Arc` between the poller and interactive
/// door commands.
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    timeout: Duration,
    /// Most recent challenge answered, kept for diagnostics only.
    last_challenge: RwLock<Option<DigestChallenge>>,
}

impl DeviceClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the scheme-qualified device root,
    /// e.g. `http://192.168.1.201`.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(
            http,
            base_url,
            credentials,
            transport.timeout,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Credentials,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            timeout,
            last_challenge: RwLock::new(None),
        }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The username presented to the device.
    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// The last Digest challenge this client answered, if any.
    pub fn last_challenge(&self) -> Option<DigestChallenge> {
        self.last_challenge
            .read()
            .expect("challenge lock poisoned")
            .clone()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for a CGI path such as
    /// `cgi-bin/magicBox.cgi?action=getDeviceInfo`.
    pub(crate) fn cgi_url(&self, path_and_query: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path_and_query.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request, answering at most one Digest challenge.
    pub(crate) async fn get(&self, url: Url) -> Result<Bytes, Error> {
        debug!("GET {}", url);

        let resp = self.send(self.http.get(url.clone())).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return self.read_body(resp).await;
        }

        let challenge = challenge_from(&resp)?;
        drop(resp);
        trace!(realm = %challenge.realm, qop = ?challenge.qop, "received digest challenge");

        let authorization = digest::build_authorization_header(
            "GET",
            &digest_uri(&url),
            &challenge,
            &self.credentials.username,
            self.credentials.password.expose_secret(),
        )?;
        *self
            .last_challenge
            .write()
            .expect("challenge lock poisoned") = Some(challenge);

        let resp = self
            .send(self.http.get(url).header(AUTHORIZATION, authorization))
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!("device rejected digest credentials");
            return Err(Error::Authentication {
                message: "device rejected the supplied credentials".into(),
            });
        }

        self.read_body(resp).await
    }

    /// GET and decode the body as text (lossy for non-UTF-8 bytes).
    pub(crate) async fn get_text(&self, url: Url) -> Result<String, Error> {
        let body = self.get(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        builder.send().await.map_err(|e| self.transport_error(e))
    }

    /// Return the body of a 2xx response, or `Error::Http` otherwise.
    async fn read_body(&self, resp: reqwest::Response) -> Result<Bytes, Error> {
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body: preview(&body).to_owned(),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        trace!(bytes = body.len(), "response body received");
        Ok(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: timeout_secs(self.timeout),
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Extract the Digest challenge from a 401 response.
fn challenge_from(resp: &reqwest::Response) -> Result<DigestChallenge, Error> {
    let header = resp
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.trim_start().to_ascii_lowercase().starts_with("digest"))
        .ok_or_else(|| Error::Authentication {
            message: "device requires authentication but sent no Digest challenge".into(),
        })?;

    Ok(DigestChallenge::parse(header)?)
}

/// The request-target used in the digest `uri` parameter: path plus query.
fn digest_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_owned(),
    }
}

/// Whole seconds, rounded up so sub-second timeouts never read as zero.
fn timeout_secs(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

pub(crate) fn preview(text: &str) -> &str {
    match text.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_uri_keeps_query() {
        let url = Url::parse(
            "http://10.0.0.2/cgi-bin/accessControl.cgi?action=getDoorStatus&channel=1",
        )
        .expect("valid url");
        assert_eq!(
            digest_uri(&url),
            "/cgi-bin/accessControl.cgi?action=getDoorStatus&channel=1"
        );
    }

    #[test]
    fn timeout_is_rounded_up_to_whole_seconds() {
        assert_eq!(timeout_secs(Duration::from_millis(200)), 1);
        assert_eq!(timeout_secs(Duration::from_secs(20)), 20);
        assert_eq!(timeout_secs(Duration::from_millis(10_500)), 11);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(BODY_PREVIEW_LEN + 10);
        assert_eq!(preview(&long).chars().count(), BODY_PREVIEW_LEN);
        assert_eq!(preview("short"), "short");
    }
}

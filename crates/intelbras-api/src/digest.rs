// HTTP Digest authentication
//
// Challenge parsing and `Authorization` header construction for the
// subset of RFC 7616 the device speaks: MD5, with `qop=auth` or no qop.
// Every request is re-challenged, so the nonce count is always 1.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use md5::{Digest, Md5};
use thiserror::Error;

/// Nonce count sent with every response. Never incremented: the client
/// does not reuse a server nonce across requests.
pub const NONCE_COUNT: &str = "00000001";

const DEFAULT_ALGORITHM: &str = "MD5";

static CNONCE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported digest qop: {0}")]
    UnsupportedQop(String),

    #[error("malformed digest challenge: {0}")]
    MalformedChallenge(String),
}

/// Parameters of a `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub algorithm: String,
}

impl DigestChallenge {
    /// Parse the value of a `WWW-Authenticate` header.
    ///
    /// Parameter names are case-insensitive; quoted values may contain
    /// commas and backslash escapes. A missing `realm` is treated as empty,
    /// a missing `nonce` is an error.
    pub fn parse(header: &str) -> Result<Self, DigestError> {
        let trimmed = header.trim_start();
        let params = match trimmed.split_at_checked(6) {
            Some((scheme, rest))
                if scheme.eq_ignore_ascii_case("digest")
                    && rest.chars().next().is_none_or(char::is_whitespace) =>
            {
                rest
            }
            _ => {
                return Err(DigestError::MalformedChallenge(format!(
                    "not a Digest challenge: {header}"
                )));
            }
        };

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop = None;
        let mut algorithm = None;

        for (key, value) in parse_params(params) {
            match key.as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop = Some(value),
                "algorithm" => algorithm = Some(value),
                _ => {}
            }
        }

        let nonce = nonce
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DigestError::MalformedChallenge("missing nonce".into()))?;

        Ok(Self {
            realm: realm.unwrap_or_default(),
            nonce,
            opaque: opaque.filter(|o| !o.is_empty()),
            qop: qop.filter(|q| !q.is_empty()),
            algorithm: algorithm.unwrap_or_else(|| DEFAULT_ALGORITHM.into()),
        })
    }
}

/// Split `key=value, key="quoted, value"` pairs. Keys are lower-cased.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| *c == ',' || c.is_whitespace()).is_some() {}

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        if key.is_empty() && chars.peek().is_none() {
            break;
        }
        if chars.next_if_eq(&'=').is_none() {
            // Bare token without a value.
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim().to_owned();
        }

        params.push((key.trim().to_ascii_lowercase(), value));
    }

    params
}

/// Build the `Authorization` header value answering `challenge`.
///
/// A fresh client nonce is generated for every call.
pub fn build_authorization_header(
    method: &str,
    uri: &str,
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
) -> Result<String, DigestError> {
    build_authorization_header_with_cnonce(
        method,
        uri,
        challenge,
        username,
        password,
        &generate_cnonce(),
    )
}

/// Same as [`build_authorization_header`] with a caller-supplied cnonce.
pub fn build_authorization_header_with_cnonce(
    method: &str,
    uri: &str,
    challenge: &DigestChallenge,
    username: &str,
    password: &str,
    cnonce: &str,
) -> Result<String, DigestError> {
    if !challenge.algorithm.eq_ignore_ascii_case(DEFAULT_ALGORITHM) {
        return Err(DigestError::UnsupportedAlgorithm(challenge.algorithm.clone()));
    }
    let qop = select_qop(challenge.qop.as_deref())?;

    let ha1 = md5_hex(&format!("{username}:{}:{password}", challenge.realm));
    let ha2 = md5_hex(&format!("{method}:{uri}"));
    let response = match qop {
        Some(qop) => md5_hex(&format!(
            "{ha1}:{}:{NONCE_COUNT}:{cnonce}:{qop}:{ha2}",
            challenge.nonce
        )),
        None => md5_hex(&format!("{ha1}:{}:{ha2}", challenge.nonce)),
    };

    let mut header = format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{response}""#,
        quote(username),
        quote(&challenge.realm),
        quote(&challenge.nonce),
        quote(uri),
    );
    if let Some(opaque) = &challenge.opaque {
        let _ = write!(header, r#", opaque="{}""#, quote(opaque));
    }
    if let Some(qop) = qop {
        let _ = write!(header, r#", qop={qop}, nc={NONCE_COUNT}, cnonce="{cnonce}""#);
    }
    let _ = write!(header, ", algorithm={DEFAULT_ALGORITHM}");

    Ok(header)
}

fn select_qop(offered: Option<&str>) -> Result<Option<&'static str>, DigestError> {
    let Some(offered) = offered.map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok(None);
    };
    if offered
        .split(',')
        .any(|option| option.trim().eq_ignore_ascii_case("auth"))
    {
        Ok(Some("auth"))
    } else {
        Err(DigestError::UnsupportedQop(offered.to_owned()))
    }
}

/// Client nonce derived from the wall clock plus a process-wide sequence,
/// so two calls within the same clock tick still differ.
pub fn generate_cnonce() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let sequence = CNONCE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut cnonce = md5_hex(&format!("{nanos}:{sequence}"));
    cnonce.truncate(16);
    cnonce
}

pub(crate) fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rfc_challenge() -> DigestChallenge {
        DigestChallenge::parse(
            r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
        )
        .unwrap()
    }

    #[test]
    fn parses_quoted_and_bare_params() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="Login to ABC", qop="auth", nonce="12345", opaque="", algorithm=MD5"#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "Login to ABC");
        assert_eq!(challenge.nonce, "12345");
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert_eq!(challenge.opaque, None);
        assert_eq!(challenge.algorithm, "MD5");
    }

    #[test]
    fn quoted_value_keeps_commas() {
        let challenge = rfc_challenge();
        assert_eq!(challenge.qop.as_deref(), Some("auth,auth-int"));
        assert_eq!(
            challenge.opaque.as_deref(),
            Some("5ccc069c403ebaf9f0171e9517f40e41")
        );
    }

    #[test]
    fn algorithm_defaults_to_md5() {
        let challenge = DigestChallenge::parse(r#"digest realm="r", nonce="n""#).unwrap();
        assert_eq!(challenge.algorithm, "MD5");
        assert_eq!(challenge.qop, None);
    }

    #[test]
    fn rejects_non_digest_scheme() {
        let err = DigestChallenge::parse(r#"Basic realm="device""#).unwrap_err();
        assert!(matches!(err, DigestError::MalformedChallenge(_)));
    }

    #[test]
    fn scheme_must_be_a_whole_token() {
        let err = DigestChallenge::parse(r#"DigestXYZ realm="r", nonce="n""#).unwrap_err();
        assert!(matches!(err, DigestError::MalformedChallenge(_)));

        let challenge = DigestChallenge::parse("Digest\tnonce=n").unwrap();
        assert_eq!(challenge.nonce, "n");
    }

    #[test]
    fn rejects_missing_nonce() {
        let err = DigestChallenge::parse(r#"Digest realm="device""#).unwrap_err();
        assert!(matches!(err, DigestError::MalformedChallenge(_)));
    }

    #[test]
    fn response_matches_rfc_2617_example() {
        let header = build_authorization_header_with_cnonce(
            "GET",
            "/dir/index.html",
            &rfc_challenge(),
            "Mufasa",
            "Circle Of Life",
            "0a4f113b",
        )
        .unwrap();

        assert!(header.contains(r#"response="6629fae49393a05397450978507c4ef1""#));
        assert!(header.starts_with(r#"Digest username="Mufasa", realm="testrealm@host.com""#));
        assert!(header.contains(r#"opaque="5ccc069c403ebaf9f0171e9517f40e41""#));
        assert!(header.contains(r#"qop=auth, nc=00000001, cnonce="0a4f113b""#));
        assert!(header.ends_with("algorithm=MD5"));
    }

    #[test]
    fn response_matches_manual_computation() {
        let challenge = DigestChallenge {
            realm: "Login to 7a1f".into(),
            nonce: "1391624398".into(),
            opaque: None,
            qop: Some("auth".into()),
            algorithm: "MD5".into(),
        };
        let uri = "/cgi-bin/accessControl.cgi?action=openDoor&channel=1";
        let header = build_authorization_header_with_cnonce(
            "GET", uri, &challenge, "admin", "secret", "abcdef01",
        )
        .unwrap();

        let ha1 = md5_hex("admin:Login to 7a1f:secret");
        let ha2 = md5_hex(&format!("GET:{uri}"));
        let expected = md5_hex(&format!("{ha1}:1391624398:00000001:abcdef01:auth:{ha2}"));
        assert!(header.contains(&format!(r#"response="{expected}""#)));
        assert!(!header.contains("opaque"));
    }

    #[test]
    fn response_without_qop_omits_nc_and_cnonce() {
        let challenge = DigestChallenge::parse(r#"Digest realm="r", nonce="n""#).unwrap();
        let header =
            build_authorization_header_with_cnonce("GET", "/x", &challenge, "u", "p", "c")
                .unwrap();

        let ha1 = md5_hex("u:r:p");
        let ha2 = md5_hex("GET:/x");
        let expected = md5_hex(&format!("{ha1}:n:{ha2}"));
        assert!(header.contains(&format!(r#"response="{expected}""#)));
        assert!(!header.contains("qop="));
        assert!(!header.contains("cnonce"));
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let mut challenge = rfc_challenge();
        challenge.algorithm = "SHA-256".into();
        let err = build_authorization_header("GET", "/", &challenge, "u", "p").unwrap_err();
        assert_eq!(err, DigestError::UnsupportedAlgorithm("SHA-256".into()));
    }

    #[test]
    fn unsupported_qop_is_rejected() {
        let mut challenge = rfc_challenge();
        challenge.qop = Some("auth-int".into());
        let err = build_authorization_header("GET", "/", &challenge, "u", "p").unwrap_err();
        assert_eq!(err, DigestError::UnsupportedQop("auth-int".into()));
    }

    #[test]
    fn cnonce_is_unique_per_call() {
        let a = generate_cnonce();
        let b = generate_cnonce();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}

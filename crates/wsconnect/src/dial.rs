//! The WebSocket upgrade seam.
//!
//! The connector hands a fully formed [`DialRequest`] to an [`UpgradeDialer`]
//! and gets back either a live channel or a [`DialError`]. The error keeps
//! the proxy's or server's status and headers whenever a response was read.

use crate::endpoint::{ProxySpec, TargetSpec};
use crate::error::BoxError;
use crate::negotiate::AuthToken;
use http::header::{ORIGIN, PROXY_AUTHORIZATION};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on proxy CONNECT, TLS and WebSocket handshake together.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Certificate policy for the TLS session to the WebSocket server.
///
/// The proxy sees only an opaque tunnel; this governs the `wss` endpoint
/// behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateVerification {
    /// Validate the chain against the webpki root set.
    Enabled,
    /// Accept any certificate the server presents.
    Disabled,
}

/// Upstream certificate policy used for every connection.
///
/// INSECURE: the upstream chain is not validated. Anyone able to intercept
/// traffic past the proxy can impersonate the WebSocket server.
pub const UPSTREAM_CERT_VERIFICATION: CertificateVerification = CertificateVerification::Disabled;

/// Everything a dialer needs for one upgrade attempt.
#[derive(Debug, Clone)]
pub struct DialRequest {
    pub target: TargetSpec,
    pub proxy: ProxySpec,
    pub handshake_timeout: Duration,
    pub certificate_verification: CertificateVerification,
    /// `Proxy-Authorization` and `Origin`.
    pub headers: HeaderMap,
}

impl DialRequest {
    /// Build the request with the fixed timeout and certificate policy.
    ///
    /// A header that cannot be built is reported as [`DialError::Transport`].
    pub fn new(target: TargetSpec, proxy: ProxySpec, token: &AuthToken) -> Result<Self, DialError> {
        let mut authorization = HeaderValue::from_str(&token.to_header_value())
            .map_err(|e| DialError::Transport(Box::new(e)))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(PROXY_AUTHORIZATION, authorization);
        headers.insert(ORIGIN, target.origin().clone());

        Ok(Self {
            target,
            proxy,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            certificate_verification: UPSTREAM_CERT_VERIFICATION,
            headers,
        })
    }
}

/// Why an upgrade attempt failed.
#[derive(Error, Debug)]
pub enum DialError {
    /// A response was received but the upgrade did not complete.
    #[error("WebSocket connection failed with status {status}: {source}\nResponse Headers: {headers:?}")]
    Rejected {
        status: StatusCode,
        headers: HeaderMap,
        #[source]
        source: BoxError,
    },

    /// No response was received at all.
    #[error("Failed to establish WebSocket connection: {0}")]
    Transport(#[source] BoxError),
}

impl DialError {
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DialError::Rejected { status, .. } => Some(*status),
            DialError::Transport(_) => None,
        }
    }

    #[must_use]
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            DialError::Rejected { headers, .. } => Some(headers),
            DialError::Transport(_) => None,
        }
    }
}

/// Opens a proxied connection and performs the WebSocket upgrade.
pub trait UpgradeDialer {
    /// The live bidirectional message channel.
    type Channel;

    /// Make exactly one attempt. Implementations honor
    /// `request.handshake_timeout` and report expiry as [`DialError::Transport`].
    fn dial(
        &self,
        request: DialRequest,
    ) -> impl Future<Output = Result<Self::Channel, DialError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> DialRequest {
        let target = TargetSpec::parse("wss://chat.example.com/socket").unwrap();
        let proxy = ProxySpec::parse("http://proxy.corp:8080").unwrap();
        DialRequest::new(target, proxy, &AuthToken::from(b"tok".to_vec())).unwrap()
    }

    #[test]
    fn test_request_carries_both_headers() {
        let req = request();
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.headers[PROXY_AUTHORIZATION], "Negotiate dG9r");
        assert_eq!(req.headers[ORIGIN], "wss://chat.example.com");
    }

    #[test]
    fn test_authorization_is_sensitive() {
        let req = request();
        assert!(req.headers[PROXY_AUTHORIZATION].is_sensitive());
        assert!(!format!("{:?}", req.headers).contains("dG9r"));
    }

    #[test]
    fn test_any_token_bytes_make_a_valid_header() {
        let target = TargetSpec::parse("wss://chat.example.com/socket").unwrap();
        let proxy = ProxySpec::parse("http://proxy.corp:8080").unwrap();
        let every_byte: Vec<u8> = (0..=255u8).collect();
        let req = DialRequest::new(target, proxy, &AuthToken::from(every_byte)).unwrap();
        let value = req.headers[PROXY_AUTHORIZATION].to_str().unwrap();
        assert!(value.starts_with("Negotiate "));
    }

    #[test]
    fn test_fixed_policy() {
        let req = request();
        assert_eq!(req.handshake_timeout, Duration::from_secs(10));
        assert_eq!(req.certificate_verification, CertificateVerification::Disabled);
    }

    #[test]
    fn test_rejected_exposes_response() {
        let mut headers = HeaderMap::new();
        headers.insert("proxy-authenticate", HeaderValue::from_static("Negotiate"));
        let err = DialError::Rejected {
            status: StatusCode::PROXY_AUTHENTICATION_REQUIRED,
            headers: headers.clone(),
            source: "proxy refused CONNECT".into(),
        };
        assert_eq!(err.status(), Some(StatusCode::PROXY_AUTHENTICATION_REQUIRED));
        assert_eq!(err.headers(), Some(&headers));
        assert!(err.to_string().contains("status 407"));
    }

    #[test]
    fn test_transport_has_no_response() {
        let err = DialError::Transport("connection refused".into());
        assert!(err.status().is_none());
        assert!(err.headers().is_none());
        assert_eq!(
            err.to_string(),
            "Failed to establish WebSocket connection: connection refused"
        );
    }
}

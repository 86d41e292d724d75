//! Error types for the wsconnect crate.

use crate::dial::DialError;
use http::{HeaderMap, StatusCode};
use std::fmt;
use thiserror::Error;

/// Boxed diagnostic from an external collaborator (security provider or dialer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which of the two endpoint arguments an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Target,
    Proxy,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Target => write!(f, "target"),
            Endpoint::Proxy => write!(f, "proxy"),
        }
    }
}

/// Why an endpoint string could not be resolved.
#[derive(Error, Debug)]
pub enum EndpointParseError {
    #[error(transparent)]
    Syntax(#[from] url::ParseError),

    #[error("URL has no host")]
    MissingHost,

    /// The target authority, as written, is not a valid header value.
    #[error("cannot derive Origin header: {0}")]
    InvalidOrigin(#[from] http::header::InvalidHeaderValue),
}

/// Step of the connection sequence in which a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Parsing,
    AcquiringCredential,
    Negotiating,
    Connecting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Parsing => "parsing",
            Stage::AcquiringCredential => "acquiring_credential",
            Stage::Negotiating => "negotiating",
            Stage::Connecting => "connecting",
        };
        f.write_str(name)
    }
}

/// Errors returned by a connection attempt.
///
/// Every variant is terminal for the call; nothing is retried.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Failed to parse {endpoint} URL '{input}': {source}")]
    MalformedEndpoint {
        endpoint: Endpoint,
        input: String,
        #[source]
        source: EndpointParseError,
    },

    #[error("Failed to acquire ambient credentials: {0}")]
    CredentialAcquisitionFailed(#[source] BoxError),

    #[error("Failed to create security context for '{spn}': {source}")]
    SecurityContextFailed {
        spn: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    ConnectionFailed(#[from] DialError),
}

impl ConnectError {
    /// The step of the sequence this error came from.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            ConnectError::InvalidArgument(_) => Stage::Validating,
            ConnectError::MalformedEndpoint { .. } => Stage::Parsing,
            ConnectError::CredentialAcquisitionFailed(_) => Stage::AcquiringCredential,
            ConnectError::SecurityContextFailed { .. } => Stage::Negotiating,
            ConnectError::ConnectionFailed(_) => Stage::Connecting,
        }
    }

    /// HTTP status of the proxy or server response, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ConnectError::ConnectionFailed(e) => e.status(),
            _ => None,
        }
    }

    /// Response headers of the proxy or server response, if one was received.
    #[must_use]
    pub fn response_headers(&self) -> Option<&HeaderMap> {
        match self {
            ConnectError::ConnectionFailed(e) => e.headers(),
            _ => None,
        }
    }
}

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, ConnectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_per_variant() {
        assert_eq!(
            ConnectError::InvalidArgument("x").stage(),
            Stage::Validating
        );
        assert_eq!(
            ConnectError::CredentialAcquisitionFailed("denied".into()).stage(),
            Stage::AcquiringCredential
        );
        let err = ConnectError::SecurityContextFailed {
            spn: "HTTP/proxy.corp".to_string(),
            source: "bad name".into(),
        };
        assert_eq!(err.stage(), Stage::Negotiating);
        assert!(err.to_string().contains("HTTP/proxy.corp"));
    }

    #[test]
    fn test_malformed_endpoint_names_argument() {
        let err = ConnectError::MalformedEndpoint {
            endpoint: Endpoint::Proxy,
            input: "::nope".to_string(),
            source: EndpointParseError::MissingHost,
        };
        assert_eq!(err.stage(), Stage::Parsing);
        assert_eq!(
            err.to_string(),
            "Failed to parse proxy URL '::nope': URL has no host"
        );
    }

    #[test]
    fn test_no_response_details_outside_connect_stage() {
        let err = ConnectError::InvalidArgument("target endpoint must not be empty");
        assert!(err.status().is_none());
        assert!(err.response_headers().is_none());
    }
}

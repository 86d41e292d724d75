//! Input validation and endpoint resolution.
//!
//! Both steps are pure and run before any credential is acquired.

use crate::error::{ConnectError, Endpoint, EndpointParseError, Result};
use http::HeaderValue;
use url::Url;

/// Service class used to build the proxy's service-principal name.
const SPN_SERVICE_CLASS: &str = "HTTP";

/// Reject empty endpoint strings.
pub fn validate(target: &str, proxy: &str) -> Result<()> {
    if target.is_empty() {
        return Err(ConnectError::InvalidArgument(
            "target endpoint must not be empty",
        ));
    }
    if proxy.is_empty() {
        return Err(ConnectError::InvalidArgument(
            "proxy endpoint must not be empty",
        ));
    }
    Ok(())
}

/// Resolved WebSocket target.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    url: Url,
    host: String,
    port: u16,
    origin: HeaderValue,
}

impl TargetSpec {
    /// Parse a target endpoint such as `wss://chat.example.com/socket`.
    pub fn parse(input: &str) -> Result<Self> {
        Self::resolve(input).map_err(|source| ConnectError::MalformedEndpoint {
            endpoint: Endpoint::Target,
            input: input.to_string(),
            source,
        })
    }

    fn resolve(input: &str) -> std::result::Result<Self, EndpointParseError> {
        let url = Url::parse(input)?;
        let host = host_of(&url)?;
        let port = url.port_or_known_default().unwrap_or(443);
        let authority = written_authority(input, &url)?;
        let origin = HeaderValue::from_str(&format!("{}://{}", url.scheme(), authority))?;
        Ok(Self {
            url,
            host,
            port,
            origin,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, or the scheme's default (80 for `ws`, 443 for `wss`).
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// `Origin` header value: `scheme://` followed by the authority as it
    /// was written, port included.
    #[must_use]
    pub fn origin(&self) -> &HeaderValue {
        &self.origin
    }
}

/// Resolved forward proxy.
#[derive(Debug, Clone)]
pub struct ProxySpec {
    url: Url,
    host: String,
    port: u16,
    authority: String,
}

impl ProxySpec {
    /// Parse a proxy endpoint such as `http://proxy.corp:8080`.
    pub fn parse(input: &str) -> Result<Self> {
        Self::resolve(input).map_err(|source| ConnectError::MalformedEndpoint {
            endpoint: Endpoint::Proxy,
            input: input.to_string(),
            source,
        })
    }

    fn resolve(input: &str) -> std::result::Result<Self, EndpointParseError> {
        let url = Url::parse(input)?;
        let host = host_of(&url)?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = written_authority(input, &url)?;
        Ok(Self {
            url,
            host,
            port,
            authority,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Service-principal name the Negotiate token is bound to:
    /// `HTTP/<host[:port]>` with the authority as written.
    #[must_use]
    pub fn service_principal_name(&self) -> String {
        format!("{}/{}", SPN_SERVICE_CLASS, self.authority)
    }
}

fn host_of(url: &Url) -> std::result::Result<String, EndpointParseError> {
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(EndpointParseError::MissingHost),
    }
}

/// `host[:port]` exactly as written in `input`, without userinfo.
///
/// `url` lowercases hosts and drops default ports, so the authority is cut
/// from the raw input. Inputs written without `//` (which `url` still
/// accepts for special schemes) fall back to the parsed host and port.
fn written_authority(input: &str, url: &Url) -> std::result::Result<String, EndpointParseError> {
    let input = input.trim_matches(|c: char| c <= ' ');
    if let Some((_, rest)) = input.split_once("://") {
        let end = rest
            .find(|c: char| matches!(c, '/' | '?' | '#' | '\\'))
            .unwrap_or(rest.len());
        let authority = &rest[..end];
        let authority = authority
            .rsplit_once('@')
            .map_or(authority, |(_, host)| host);
        if !authority.is_empty() {
            return Ok(authority.to_string());
        }
    }

    let host = host_of(url)?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_target() {
        let err = validate("", "http://proxy.corp:8080").unwrap_err();
        assert!(matches!(err, ConnectError::InvalidArgument(_)));
    }

    #[test]
    fn test_validate_rejects_empty_proxy() {
        let err = validate("wss://chat.example.com/socket", "").unwrap_err();
        assert!(matches!(err, ConnectError::InvalidArgument(_)));
    }

    #[test]
    fn test_validate_accepts_non_empty() {
        assert!(validate("wss://chat.example.com/socket", "http://proxy.corp:8080").is_ok());
    }

    #[test]
    fn test_parse_target() {
        let target = TargetSpec::parse("wss://chat.example.com/socket").unwrap();
        assert_eq!(target.scheme(), "wss");
        assert_eq!(target.host(), "chat.example.com");
        assert_eq!(target.port(), 443);
        assert_eq!(target.path(), "/socket");
        assert_eq!(target.origin(), "wss://chat.example.com");
    }

    #[test]
    fn test_origin_keeps_explicit_port() {
        let target = TargetSpec::parse("ws://chat.example.com:9001/live").unwrap();
        assert_eq!(target.port(), 9001);
        assert_eq!(target.origin(), "ws://chat.example.com:9001");
    }

    #[test]
    fn test_origin_keeps_written_default_port() {
        let target = TargetSpec::parse("wss://chat.example.com:443/socket").unwrap();
        assert_eq!(target.port(), 443);
        assert_eq!(target.origin(), "wss://chat.example.com:443");
    }

    #[test]
    fn test_origin_strips_userinfo_and_query() {
        let target = TargetSpec::parse("wss://user:pw@Chat.Example.com?room=1").unwrap();
        assert_eq!(target.host(), "chat.example.com");
        assert_eq!(target.origin(), "wss://Chat.Example.com");
    }

    #[test]
    fn test_origin_rejects_control_characters() {
        // `url` silently drops the newline; the written authority keeps it.
        let err = TargetSpec::parse("ws://chat.exa\nmple.com/live").unwrap_err();
        assert!(matches!(
            err,
            ConnectError::MalformedEndpoint {
                endpoint: Endpoint::Target,
                source: EndpointParseError::InvalidOrigin(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_target_malformed() {
        let err = TargetSpec::parse("not a url").unwrap_err();
        match err {
            ConnectError::MalformedEndpoint {
                endpoint, source, ..
            } => {
                assert_eq!(endpoint, Endpoint::Target);
                assert!(matches!(source, EndpointParseError::Syntax(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_target_without_host() {
        let err = TargetSpec::parse("mailto:ops@example.com").unwrap_err();
        assert!(matches!(
            err,
            ConnectError::MalformedEndpoint {
                endpoint: Endpoint::Target,
                source: EndpointParseError::MissingHost,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_proxy() {
        let proxy = ProxySpec::parse("http://proxy.corp:8080").unwrap();
        assert_eq!(proxy.scheme(), "http");
        assert_eq!(proxy.host(), "proxy.corp");
        assert_eq!(proxy.port(), 8080);
        assert_eq!(proxy.service_principal_name(), "HTTP/proxy.corp:8080");
    }

    #[test]
    fn test_spn_without_port() {
        let proxy = ProxySpec::parse("http://proxy.corp/").unwrap();
        assert_eq!(proxy.service_principal_name(), "HTTP/proxy.corp");
    }

    #[test]
    fn test_spn_keeps_written_default_port() {
        let proxy = ProxySpec::parse("http://proxy.corp:80").unwrap();
        assert_eq!(proxy.port(), 80);
        assert_eq!(proxy.service_principal_name(), "HTTP/proxy.corp:80");
    }

    #[test]
    fn test_parse_proxy_default_port() {
        let proxy = ProxySpec::parse("http://proxy.corp").unwrap();
        assert_eq!(proxy.port(), 80);
    }

    #[test]
    fn test_parse_proxy_malformed() {
        let err = ProxySpec::parse("http://").unwrap_err();
        assert!(matches!(
            err,
            ConnectError::MalformedEndpoint {
                endpoint: Endpoint::Proxy,
                ..
            }
        ));
    }
}

//! WebSocket connections through Negotiate-authenticating forward proxies.
//!
//! `wsconnect` opens an outbound WebSocket through a corporate proxy that
//! demands integrated Windows authentication, using the identity of the
//! calling process (no prompt, no password):
//!
//! 1. Validate and parse the target and proxy URLs
//! 2. Acquire the ambient credential
//! 3. Create a SPNEGO context for `HTTP/<proxy host>` and take its token
//! 4. `CONNECT` through the proxy with `Proxy-Authorization: Negotiate ...`
//! 5. Upgrade to a WebSocket with an `Origin` header
//!
//! The security mechanism and the dialer are traits
//! ([`NegotiateProvider`], [`UpgradeDialer`]). The crate ships an SSPI
//! provider on Windows, a GSSAPI provider on Unix behind the `gssapi`
//! feature, and [`TunnelDialer`] for HTTP CONNECT proxies.
//!
//! Upstream TLS certificates are **not** verified; see
//! [`UPSTREAM_CERT_VERIFICATION`].

pub mod audit;
pub mod connect;
pub mod dial;
pub mod endpoint;
pub mod error;
pub mod negotiate;
pub mod tls;
pub mod tunnel;

pub use connect::Connector;
pub use dial::{
    CertificateVerification, DialError, DialRequest, UpgradeDialer, HANDSHAKE_TIMEOUT,
    UPSTREAM_CERT_VERIFICATION,
};
pub use endpoint::{ProxySpec, TargetSpec};
pub use error::{BoxError, ConnectError, Endpoint, Result, Stage};
pub use negotiate::{AuthToken, NegotiateProvider};
pub use tunnel::{Channel, TunnelDialer, TunnelStream};

#[cfg(any(windows, all(unix, feature = "gssapi")))]
pub use negotiate::PlatformProvider;

/// Connect to `target` through `proxy` with the platform Negotiate provider.
///
/// ```no_run
/// # async fn run() -> wsconnect::Result<()> {
/// let channel = wsconnect::connect("wss://chat.example.com/socket", "http://proxy.corp:8080").await?;
/// # drop(channel);
/// # Ok(())
/// # }
/// ```
#[cfg(any(windows, all(unix, feature = "gssapi")))]
pub async fn connect(target: &str, proxy: &str) -> Result<Channel> {
    Connector::new(PlatformProvider::default(), TunnelDialer::new())
        .connect(target, proxy)
        .await
}

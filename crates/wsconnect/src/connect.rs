//! The connection sequence.
//!
//! `Connector::connect` runs, in order:
//! 1. Input validation (empty strings)
//! 2. Endpoint resolution (target and proxy URLs)
//! 3. Ambient credential acquisition
//! 4. Single-leg security context creation for `HTTP/<proxy host>`
//! 5. Proxied WebSocket upgrade with `Proxy-Authorization` and `Origin`
//!
//! Any failure ends the call. The credential and context never outlive
//! step 4: the context is released first, then the credential.

use crate::audit;
use crate::dial::{DialRequest, UpgradeDialer};
use crate::endpoint::{self, ProxySpec, TargetSpec};
use crate::error::{ConnectError, Result};
use crate::negotiate::{AuthToken, NegotiateProvider};
use tracing::debug;

/// Connects through a Negotiate-authenticating proxy.
///
/// Holds no per-connection state; each call acquires and releases its own
/// credential and context.
#[derive(Debug, Clone)]
pub struct Connector<P, D> {
    provider: P,
    dialer: D,
}

impl<P, D> Connector<P, D>
where
    P: NegotiateProvider,
    D: UpgradeDialer,
{
    pub fn new(provider: P, dialer: D) -> Self {
        Self { provider, dialer }
    }

    /// Open a WebSocket to `target` through `proxy` using the caller's
    /// ambient identity.
    pub async fn connect(&self, target: &str, proxy: &str) -> Result<D::Channel> {
        let result = self.establish(target, proxy).await;
        match &result {
            Ok(_) => audit::log_established(target, proxy),
            Err(e) => audit::log_failed(target, proxy, e.stage(), &e.to_string()),
        }
        result
    }

    async fn establish(&self, target: &str, proxy: &str) -> Result<D::Channel> {
        endpoint::validate(target, proxy)?;

        let target = TargetSpec::parse(target)?;
        let proxy = ProxySpec::parse(proxy)?;

        let token = self.negotiate(&proxy)?;
        let request = DialRequest::new(target, proxy, &token)?;
        drop(token);

        debug!("Dialing {} via {}", request.target.url(), request.proxy.url());
        let channel = self.dialer.dial(request).await?;
        Ok(channel)
    }

    /// Acquire the ambient credential and produce the first-leg token.
    fn negotiate(&self, proxy: &ProxySpec) -> Result<AuthToken> {
        let credential = self
            .provider
            .acquire_credentials()
            .map_err(ConnectError::CredentialAcquisitionFailed)?;
        debug!("Acquired ambient credential");

        let spn = proxy.service_principal_name();
        let (context, token) = match self.provider.new_client_context(&credential, &spn) {
            Ok(created) => created,
            Err(source) => {
                drop(credential);
                return Err(ConnectError::SecurityContextFailed { spn, source });
            }
        };
        debug!("Created security context for {} ({} byte token)", spn, token.len());

        drop(context);
        drop(credential);
        Ok(token)
    }
}

//! Negotiate (SPNEGO) token acquisition.
//!
//! The security mechanism itself belongs to the platform: SSPI on Windows,
//! GSSAPI elsewhere. This module only defines the seam the connector calls
//! through and the token type that crosses it.
//!
//! Credentials and security contexts are plain owned values. Dropping one
//! releases the underlying platform handle, so every exit path releases each
//! handle exactly once.

#[cfg(all(unix, feature = "gssapi"))]
mod gssapi;
#[cfg(windows)]
mod sspi;

#[cfg(all(unix, feature = "gssapi"))]
pub use self::gssapi::Gssapi;
#[cfg(windows)]
pub use self::sspi::Sspi;

/// The Negotiate provider for the current platform.
#[cfg(windows)]
pub type PlatformProvider = Sspi;

/// The Negotiate provider for the current platform.
#[cfg(all(unix, feature = "gssapi"))]
pub type PlatformProvider = Gssapi;

use crate::error::BoxError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use zeroize::Zeroizing;

/// Authentication scheme name used in `Proxy-Authorization`.
pub const NEGOTIATE_SCHEME: &str = "Negotiate";

/// Source of ambient-identity Negotiate tokens.
///
/// `acquire_credentials` must never prompt and never take a secret. Only the
/// first leg of a context is ever requested.
pub trait NegotiateProvider {
    /// Handle to the calling identity's credentials. Released on drop.
    type Credential;
    /// Client security context bound to one service name. Released on drop.
    type Context;

    /// Acquire the ambient credential of the current process.
    fn acquire_credentials(&self) -> Result<Self::Credential, BoxError>;

    /// Create a client context for `service_principal_name` and return it
    /// together with its first-leg token.
    fn new_client_context(
        &self,
        credential: &Self::Credential,
        service_principal_name: &str,
    ) -> Result<(Self::Context, AuthToken), BoxError>;
}

/// Opaque first-leg token copied out of a security context.
///
/// Owns its bytes, so it stays valid after the context is released. The
/// bytes are zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(Zeroizing<Vec<u8>>);

impl AuthToken {
    /// Copy token bytes out of provider-owned memory.
    #[must_use]
    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        Self(Zeroizing::new(bytes.to_vec()))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Negotiate <base64(token)>`, ready for `Proxy-Authorization`.
    #[must_use]
    pub fn to_header_value(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("{} {}", NEGOTIATE_SCHEME, STANDARD.encode(&*self.0)))
    }
}

impl From<Vec<u8>> for AuthToken {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_is_negotiate_base64() {
        let token = AuthToken::from(b"\x60\x82token".to_vec());
        let expected = format!("Negotiate {}", STANDARD.encode(b"\x60\x82token"));
        assert_eq!(*token.to_header_value(), expected);
    }

    #[test]
    fn test_header_value_empty_token() {
        let token = AuthToken::from(Vec::new());
        assert!(token.is_empty());
        assert_eq!(*token.to_header_value(), "Negotiate ");
    }

    #[test]
    fn test_copy_outlives_source() {
        let source = vec![1u8, 2, 3];
        let token = AuthToken::copy_from_slice(&source);
        drop(source);
        assert_eq!(token.as_bytes(), &[1, 2, 3]);
        assert_eq!(token.len(), 3);
    }

    #[test]
    fn test_debug_hides_bytes() {
        let token = AuthToken::from(b"secret".to_vec());
        let debug = format!("{:?}", token);
        assert!(!debug.contains("115"));
        assert!(debug.contains("len: 6"));
    }
}

//! GSSAPI SPNEGO provider (Unix, `gssapi` feature).
//!
//! The initiator credential is the default one from the caller's credential
//! cache (`kinit`, SSSD, a keytab-backed ccache), so nothing is prompted.

use super::{AuthToken, NegotiateProvider};
use crate::error::BoxError;
use libgssapi::context::{ClientCtx, CtxFlags};
use libgssapi::credential::{Cred, CredUsage};
use libgssapi::name::Name;
use libgssapi::oid::{OidSet, GSS_MECH_SPNEGO, GSS_NT_KRB5_PRINCIPAL};
use std::cell::Cell;
use tracing::debug;

/// GSSAPI provider negotiating SPNEGO with the default initiator credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct Gssapi;

/// Default initiator credential.
///
/// `ClientCtx` takes ownership of the credential it is built from, so the
/// handle moves into the first context created from it and is released when
/// that context is.
pub struct Credential(Cell<Option<Cred>>);

impl NegotiateProvider for Gssapi {
    type Credential = Credential;
    type Context = ClientCtx;

    fn acquire_credentials(&self) -> Result<Credential, BoxError> {
        let mut mechs = OidSet::new()?;
        mechs.add(&GSS_MECH_SPNEGO)?;
        let cred = Cred::acquire(None, None, CredUsage::Initiate, Some(&mechs))?;
        debug!("Acquired default GSSAPI initiator credential");
        Ok(Credential(Cell::new(Some(cred))))
    }

    fn new_client_context(
        &self,
        credential: &Credential,
        service_principal_name: &str,
    ) -> Result<(ClientCtx, AuthToken), BoxError> {
        let cred = credential
            .0
            .take()
            .ok_or("credential is already bound to a security context")?;
        let target = Name::new(service_principal_name.as_bytes(), Some(&GSS_NT_KRB5_PRINCIPAL))?;

        let mut context = ClientCtx::new(Some(cred), target, CtxFlags::empty(), Some(&GSS_MECH_SPNEGO));
        let token = context
            .step(None, None)?
            .ok_or("GSSAPI produced no initial token")?;
        let token = AuthToken::copy_from_slice(&token);

        Ok((context, token))
    }
}

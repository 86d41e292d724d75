//! SSPI `Negotiate` package (Windows).
//!
//! Credentials come from `AcquireCredentialsHandleW` with no principal and no
//! auth data, which selects the logged-on user. The context is created with
//! one call to `InitializeSecurityContextW`; the output token is allocated by
//! SSPI and copied out before the buffer is freed.

#![allow(unsafe_code)]

use super::{AuthToken, NegotiateProvider};
use crate::error::BoxError;
use std::ffi::c_void;
use std::ptr::{null, null_mut};
use tracing::debug;
use windows_sys::Win32::Foundation::{SEC_E_OK, SEC_I_CONTINUE_NEEDED};
use windows_sys::Win32::Security::Authentication::Identity::{
    AcquireCredentialsHandleW, DeleteSecurityContext, FreeContextBuffer, FreeCredentialsHandle,
    InitializeSecurityContextW, SecBuffer, SecBufferDesc, ISC_REQ_ALLOCATE_MEMORY,
    ISC_REQ_CONNECTION, SECBUFFER_TOKEN, SECBUFFER_VERSION, SECPKG_CRED_OUTBOUND,
    SECURITY_NATIVE_DREP,
};
use windows_sys::Win32::Security::Credentials::SecHandle;

/// SSPI security package name.
const NEGOTIATE_PACKAGE: &str = "Negotiate";

/// Windows SSPI provider using the current logon session.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sspi;

/// Outbound credential handle. Freed on drop.
pub struct CredentialHandle(SecHandle);

impl Drop for CredentialHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was filled by a successful AcquireCredentialsHandleW
        // and is freed only here.
        unsafe {
            FreeCredentialsHandle(&self.0);
        }
    }
}

/// Client security context handle. Deleted on drop.
pub struct ContextHandle(SecHandle);

impl Drop for ContextHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was filled by InitializeSecurityContextW with an
        // accepted status and is deleted only here.
        unsafe {
            DeleteSecurityContext(&self.0);
        }
    }
}

/// Token buffer allocated by SSPI (`ISC_REQ_ALLOCATE_MEMORY`).
struct ContextBuffer(*mut c_void);

impl Drop for ContextBuffer {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: pointer came from SSPI's allocator.
            unsafe {
                FreeContextBuffer(self.0);
            }
        }
    }
}

fn empty_handle() -> SecHandle {
    SecHandle {
        dwLower: 0,
        dwUpper: 0,
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

impl NegotiateProvider for Sspi {
    type Credential = CredentialHandle;
    type Context = ContextHandle;

    fn acquire_credentials(&self) -> Result<CredentialHandle, BoxError> {
        let package = wide(NEGOTIATE_PACKAGE);
        let mut handle = empty_handle();
        let mut expiry = 0i64;

        // SAFETY: all pointers are valid for the duration of the call; null
        // principal and auth data select the current logon session.
        let status = unsafe {
            AcquireCredentialsHandleW(
                null(),
                package.as_ptr(),
                SECPKG_CRED_OUTBOUND,
                null(),
                null(),
                None,
                null(),
                &mut handle,
                &mut expiry,
            )
        };
        if status != SEC_E_OK {
            return Err(format!("AcquireCredentialsHandleW failed: 0x{:08x}", status).into());
        }

        debug!("Acquired SSPI credential handle for package {}", NEGOTIATE_PACKAGE);
        Ok(CredentialHandle(handle))
    }

    fn new_client_context(
        &self,
        credential: &CredentialHandle,
        service_principal_name: &str,
    ) -> Result<(ContextHandle, AuthToken), BoxError> {
        let target = wide(service_principal_name);
        let mut context = empty_handle();
        let mut output = SecBuffer {
            cbBuffer: 0,
            BufferType: SECBUFFER_TOKEN,
            pvBuffer: null_mut(),
        };
        let mut output_desc = SecBufferDesc {
            ulVersion: SECBUFFER_VERSION,
            cBuffers: 1,
            pBuffers: &mut output,
        };
        let mut attributes = 0u32;
        let mut expiry = 0i64;

        // SAFETY: credential handle is live for the borrow; output buffers are
        // local and SSPI allocates the token memory.
        let status = unsafe {
            InitializeSecurityContextW(
                &credential.0,
                null(),
                target.as_ptr(),
                ISC_REQ_ALLOCATE_MEMORY | ISC_REQ_CONNECTION,
                0,
                SECURITY_NATIVE_DREP,
                null(),
                0,
                &mut context,
                &mut output_desc,
                &mut attributes,
                &mut expiry,
            )
        };
        let buffer = ContextBuffer(output.pvBuffer);

        if status != SEC_E_OK && status != SEC_I_CONTINUE_NEEDED {
            return Err(format!(
                "InitializeSecurityContextW failed for '{}': 0x{:08x}",
                service_principal_name, status
            )
            .into());
        }
        let context = ContextHandle(context);

        if buffer.0.is_null() || output.cbBuffer == 0 {
            return Err("InitializeSecurityContextW returned no token".into());
        }

        // SAFETY: SSPI reports cbBuffer valid bytes at pvBuffer; they are copied
        // before `buffer` frees them.
        let bytes =
            unsafe { std::slice::from_raw_parts(buffer.0 as *const u8, output.cbBuffer as usize) };
        let token = AuthToken::copy_from_slice(bytes);
        drop(buffer);

        Ok((context, token))
    }
}

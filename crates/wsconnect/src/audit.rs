//! Audit logging for connection attempts.
//!
//! Logs each attempt's outcome with structured fields via `tracing`.
//! Tokens and header values are never included.

use crate::error::Stage;
use tracing::info;

/// Log a successful upgrade.
pub fn log_established(target: &str, proxy: &str) {
    info!(
        target: "wsconnect::audit",
        target_url = target,
        proxy = proxy,
        decision = "established",
        "websocket connection established"
    );
}

/// Log a failed attempt and the step it failed in.
pub fn log_failed(target: &str, proxy: &str, stage: Stage, reason: &str) {
    info!(
        target: "wsconnect::audit",
        target_url = target,
        proxy = proxy,
        decision = "failed",
        stage = %stage,
        reason = reason,
        "websocket connection failed"
    );
}

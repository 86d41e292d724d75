//! Error types for the wsconnect CLI.

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Connect(#[from] wsconnect::ConnectError),

    #[error("WebSocket session error: {0}")]
    Session(#[from] WsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(not(any(windows, all(unix, feature = "gssapi"))))]
    #[error("no Negotiate provider on this platform (rebuild with the `gssapi` feature)")]
    NoProvider,
}

pub type Result<T> = std::result::Result<T, CliError>;

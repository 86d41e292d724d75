//! CLI argument definitions for wsconnect
//!
//! Uses clap for argument parsing.

use clap::Parser;

/// wsconnect - WebSocket through a Negotiate proxy
///
/// Opens a WebSocket to TARGET through an HTTP proxy that requires
/// integrated Windows authentication, using the identity of the current
/// user. Lines read from stdin are sent as text messages; received
/// messages are printed to stdout.
#[derive(Parser, Debug)]
#[command(name = "wsconnect")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Interactive session through the corporate proxy
    wsconnect wss://chat.example.com/socket --proxy http://proxy.corp:8080

    # Send one message and print the first reply
    wsconnect wss://chat.example.com/socket --proxy http://proxy.corp:8080 --send ping --once

    # Proxy taken from the environment
    WSCONNECT_PROXY=http://proxy.corp:8080 wsconnect wss://chat.example.com/socket
")]
pub struct Cli {
    /// WebSocket URL to connect to (ws:// or wss://)
    pub target: String,

    /// HTTP proxy URL (e.g., http://proxy.corp:8080)
    #[arg(long, short = 'p', env = "WSCONNECT_PROXY")]
    pub proxy: String,

    /// Text message to send after connecting (repeatable)
    #[arg(long = "send", value_name = "TEXT")]
    pub send: Vec<String>,

    /// Exit after the first received message instead of reading stdin
    #[arg(long)]
    pub once: bool,

    /// Silent mode - suppress status output on stderr
    #[arg(long, short = 's')]
    pub silent: bool,
}

//! wsconnect CLI - WebSocket client for Negotiate-authenticating proxies
//!
//! Connects with the current user's identity, then pumps stdin lines out as
//! text messages and prints whatever the server sends.

mod cli;
mod error;
mod output;
mod session;

use clap::Parser;
use cli::Cli;
use error::Result;
use session::SessionOptions;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr; stdout is reserved for received messages
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("wsconnect: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(session(cli));
    // A pending stdin read would otherwise keep the runtime alive
    runtime.shutdown_background();
    result
}

async fn session(cli: Cli) -> Result<()> {
    let channel = open(&cli.target, &cli.proxy).await?;
    info!("Connected to {} via {}", cli.target, cli.proxy);
    output::print_connected(&cli.target, &cli.proxy, cli.silent);

    let options = SessionOptions {
        send: cli.send,
        once: cli.once,
    };
    let input = BufReader::new(tokio::io::stdin());
    let received = session::pump(channel, input, tokio::io::stdout(), &options).await?;

    output::print_closed(received, cli.silent);
    Ok(())
}

#[cfg(any(windows, all(unix, feature = "gssapi")))]
async fn open(target: &str, proxy: &str) -> Result<wsconnect::Channel> {
    Ok(wsconnect::connect(target, proxy).await?)
}

#[cfg(not(any(windows, all(unix, feature = "gssapi"))))]
async fn open(_target: &str, _proxy: &str) -> Result<wsconnect::Channel> {
    Err(error::CliError::NoProvider)
}

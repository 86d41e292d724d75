//! HTTP CONNECT tunnel dialer.
//!
//! Opens the WebSocket through a forward proxy by:
//! 1. Connecting to the proxy over TCP
//! 2. Sending `CONNECT host:port` with the request's `Proxy-*` headers
//! 3. Reading the proxy's status line and headers
//! 4. Running TLS over the tunnel for `wss` targets
//! 5. Performing the WebSocket upgrade with the remaining headers
//!
//! All five steps share one handshake deadline.

use crate::dial::{DialError, DialRequest, UpgradeDialer};
use crate::error::BoxError;
use crate::tls;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    ReadBuf,
};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;
use zeroize::Zeroizing;

/// Maximum total size of the proxy's CONNECT response head, status line
/// included (64 KiB).
const MAX_HEADER_SIZE: usize = 64 * 1024;

/// Live WebSocket carried over the proxy tunnel.
pub type Channel = WebSocketStream<TunnelStream>;

/// The tunnel beneath the WebSocket: raw for `ws`, TLS for `wss`.
pub enum TunnelStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for TunnelStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            TunnelStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TunnelStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            TunnelStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_flush(cx),
            TunnelStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            TunnelStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Dialer that tunnels through an HTTP forward proxy with `CONNECT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TunnelDialer;

impl TunnelDialer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl UpgradeDialer for TunnelDialer {
    type Channel = Channel;

    async fn dial(&self, request: DialRequest) -> Result<Channel, DialError> {
        let timeout = request.handshake_timeout;
        match tokio::time::timeout(timeout, handshake(&request)).await {
            Ok(result) => result,
            Err(_) => Err(transport(format!(
                "handshake did not complete within {}s",
                timeout.as_secs()
            ))),
        }
    }
}

async fn handshake(request: &DialRequest) -> Result<Channel, DialError> {
    let tunnel = open_tunnel(request).await?;

    let stream = if request.target.scheme() == "wss" {
        let connector =
            tls::connector(request.certificate_verification).map_err(transport)?;
        let server_name =
            rustls::pki_types::ServerName::try_from(tls_host(request.target.host()).to_string())
                .map_err(|_| transport("invalid server name for TLS"))?;
        let tls_stream = connector
            .connect(server_name, tunnel)
            .await
            .map_err(|e| transport(format!("TLS handshake failed: {}", e)))?;
        TunnelStream::Tls(Box::new(tls_stream))
    } else {
        TunnelStream::Plain(tunnel)
    };

    let mut upgrade = request
        .target
        .url()
        .as_str()
        .into_client_request()
        .map_err(transport)?;
    for (name, value) in &request.headers {
        if !is_proxy_header(name) {
            upgrade.headers_mut().append(name.clone(), value.clone());
        }
    }

    match tokio_tungstenite::client_async(upgrade, stream).await {
        Ok((channel, response)) => {
            debug!(
                "WebSocket upgrade to {} completed with status {}",
                request.target.url(),
                response.status()
            );
            Ok(channel)
        }
        Err(WsError::Http(response)) => Err(DialError::Rejected {
            status: response.status(),
            headers: response.headers().clone(),
            source: format!("{} did not switch protocols", request.target.url()).into(),
        }),
        Err(e) => Err(transport(e)),
    }
}

/// Connect to the proxy and ask it for a tunnel to the target.
async fn open_tunnel(request: &DialRequest) -> Result<TcpStream, DialError> {
    let proxy = &request.proxy;
    if proxy.scheme() != "http" {
        return Err(transport(format!(
            "unsupported proxy scheme '{}'",
            proxy.scheme()
        )));
    }

    let proxy_addr = format!("{}:{}", proxy.host(), proxy.port());
    let mut stream = TcpStream::connect(&proxy_addr)
        .await
        .map_err(|e| transport(format!("cannot connect to proxy {}: {}", proxy_addr, e)))?;

    let authority = format!("{}:{}", request.target.host(), request.target.port());
    debug!("Sending CONNECT {} to proxy {}", authority, proxy_addr);
    let connect_req = build_connect_request(&authority, &request.headers);
    stream
        .write_all(&connect_req)
        .await
        .map_err(|e| transport(format!("failed to send CONNECT to proxy: {}", e)))?;

    let mut buf_reader = BufReader::new(&mut stream);
    let mut budget = MAX_HEADER_SIZE as u64;
    let status_line = read_head_line(&mut buf_reader, &mut budget, "response").await?;
    if status_line.is_empty() {
        return Err(transport("proxy closed the connection without responding"));
    }
    let status = parse_status_code(&String::from_utf8_lossy(&status_line))?;

    let mut headers = HeaderMap::new();
    loop {
        let line = read_head_line(&mut buf_reader, &mut budget, "response headers").await?;
        if trim_ascii(&line).is_empty() {
            break;
        }
        parse_header_line(&line, &mut headers);
    }

    if !status.is_success() {
        debug!("Proxy rejected CONNECT {} with status {}", authority, status);
        return Err(DialError::Rejected {
            status,
            headers,
            source: format!("proxy rejected CONNECT to {}", authority).into(),
        });
    }

    let read_ahead = !buf_reader.buffer().is_empty();
    drop(buf_reader);
    if read_ahead {
        return Err(transport("proxy sent data before the tunnel was used"));
    }

    debug!("Tunnel to {} established via {}", authority, proxy_addr);
    Ok(stream)
}

/// Read one line of the proxy's response head as raw bytes, charging it
/// against `budget`. An empty result means the proxy closed the connection.
async fn read_head_line<R>(
    reader: &mut R,
    budget: &mut u64,
    part: &str,
) -> Result<Vec<u8>, DialError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(*budget)
        .read_until(b'\n', &mut line)
        .await
        .map_err(|e| transport(format!("failed to read proxy {}: {}", part, e)))?;
    *budget = budget.saturating_sub(n as u64);
    if *budget == 0 && !line.ends_with(b"\n") {
        return Err(transport("proxy response headers too large"));
    }
    Ok(line)
}

/// Serialize the CONNECT request. Only `Proxy-*` headers are sent to the
/// proxy; the buffer is zeroed on drop because it carries the credential.
fn build_connect_request(authority: &str, headers: &HeaderMap) -> Zeroizing<Vec<u8>> {
    let mut req = Zeroizing::new(Vec::with_capacity(256));
    req.extend_from_slice(
        format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n", authority, authority).as_bytes(),
    );
    for (name, value) in headers {
        if is_proxy_header(name) {
            req.extend_from_slice(name.as_str().as_bytes());
            req.extend_from_slice(b": ");
            req.extend_from_slice(value.as_bytes());
            req.extend_from_slice(b"\r\n");
        }
    }
    req.extend_from_slice(b"\r\n");
    req
}

fn is_proxy_header(name: &HeaderName) -> bool {
    name.as_str().starts_with("proxy-")
}

/// Parse HTTP status code from a response line.
fn parse_status_code(line: &str) -> Result<StatusCode, DialError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 || !parts[0].starts_with("HTTP/") {
        return Err(transport(format!(
            "malformed HTTP response from proxy: {}",
            line.trim_end()
        )));
    }
    StatusCode::from_bytes(parts[1].as_bytes()).map_err(|_| {
        transport(format!(
            "invalid status code in proxy response: {}",
            line.trim_end()
        ))
    })
}

/// Add one `Name: value` line to `headers`; lines that are not valid
/// headers are skipped. Values may carry non-UTF-8 bytes.
fn parse_header_line(line: &[u8], headers: &mut HeaderMap) {
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        debug!("Skipping malformed proxy header line");
        return;
    };
    let (name, value) = (trim_ascii(&line[..colon]), trim_ascii(&line[colon + 1..]));
    match (HeaderName::from_bytes(name), HeaderValue::from_bytes(value)) {
        (Ok(name), Ok(value)) => {
            headers.append(name, value);
        }
        _ => debug!(
            "Skipping invalid proxy header {}",
            String::from_utf8_lossy(name)
        ),
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// `url` brackets IPv6 literals; rustls wants the bare address.
fn tls_host(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

fn transport(e: impl Into<BoxError>) -> DialError {
    DialError::Transport(e.into())
}

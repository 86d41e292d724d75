//! Interactive message pump over an established channel.
//!
//! Queued `--send` messages go first. Then stdin lines become text messages
//! and received messages are written to stdout, until the peer closes. On
//! stdin EOF a close frame is sent and the pump waits for the peer's close.

use crate::error::CliError;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

/// How a session should run.
#[derive(Debug, Default, Clone)]
pub struct SessionOptions {
    /// Text messages sent right after connecting.
    pub send: Vec<String>,
    /// Stop after the first data message instead of reading input.
    pub once: bool,
}

/// Drive `channel` until the peer closes (or, with `once`, until the first
/// data message arrives). Returns the number of data messages received.
pub async fn pump<S, R, W>(
    channel: S,
    input: R,
    mut output: W,
    options: &SessionOptions,
) -> Result<usize, CliError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = channel.split();
    for text in &options.send {
        sink.send(Message::Text(text.clone().into())).await?;
    }

    let mut received = 0usize;
    let mut lines = input.lines();
    let mut input_open = !options.once;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) => sink.send(Message::Text(line.into())).await?,
                    None => {
                        debug!("Input closed, sending close frame");
                        input_open = false;
                        sink.send(Message::Close(None)).await?;
                    }
                }
            }
            message = stream.next() => {
                let Some(message) = message else { break };
                match message? {
                    Message::Text(text) => {
                        output.write_all(text.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                    }
                    Message::Binary(bytes) => output.write_all(&bytes).await?,
                    Message::Close(frame) => {
                        debug!("Peer closed the connection: {:?}", frame);
                        break;
                    }
                    _ => continue,
                }
                output.flush().await?;
                received += 1;
                if options.once {
                    sink.send(Message::Close(None)).await?;
                    break;
                }
            }
        }
    }

    Ok(received)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_tungstenite::WebSocketStream;

    async fn pair() -> (
        WebSocketStream<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (client, server)
    }

    #[tokio::test]
    async fn test_once_sends_queue_and_prints_reply() {
        let (client, mut server) = pair().await;
        let peer = tokio::spawn(async move {
            let first = server.next().await.unwrap().unwrap();
            server.send(Message::Text("pong".into())).await.unwrap();
            first
        });

        let options = SessionOptions {
            send: vec!["ping".to_string()],
            once: true,
        };
        let mut out = Vec::new();
        let received = pump(client, &b""[..], &mut out, &options).await.unwrap();

        assert_eq!(received, 1);
        assert_eq!(out, b"pong\n");
        assert_eq!(peer.await.unwrap(), Message::Text("ping".into()));
    }

    #[tokio::test]
    async fn test_input_lines_become_messages_until_close() {
        let (client, mut server) = pair().await;
        let peer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(Ok(message)) = server.next().await {
                match message {
                    Message::Text(text) => {
                        server
                            .send(Message::Text(text.to_uppercase().into()))
                            .await
                            .unwrap();
                        seen.push(text.to_string());
                    }
                    // Keep polling so the close reply is flushed.
                    _ => {}
                }
            }
            seen
        });

        let mut out = Vec::new();
        let input = &b"one\ntwo\n"[..];
        let received = pump(client, input, &mut out, &SessionOptions::default())
            .await
            .unwrap();

        assert_eq!(peer.await.unwrap(), vec!["one", "two"]);
        assert_eq!(received, 2);
        assert_eq!(out, b"ONE\nTWO\n");
    }

    #[tokio::test]
    async fn test_binary_written_raw() {
        let (client, mut server) = pair().await;
        tokio::spawn(async move {
            server.send(Message::Binary(vec![0, 1, 2].into())).await.unwrap();
            server.close(None).await.unwrap();
        });

        let options = SessionOptions {
            send: Vec::new(),
            once: true,
        };
        let mut out = Vec::new();
        pump(client, &b""[..], &mut out, &options).await.unwrap();
        assert_eq!(out, vec![0, 1, 2]);
    }
}

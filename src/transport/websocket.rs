//! WebSocket implementation of the duplex channel.
//!
//! The bearer token travels as the `Sec-WebSocket-Protocol` header of the
//! upgrade request, never in-band. After the upgrade the socket is split:
//! a writer task drains an mpsc queue into the sink and a reader task
//! forwards text frames to the receiver returned by [`WsChannel::connect`].

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::channel::DuplexChannel;
use crate::error::{Error, Result};

/// Header used to carry the bearer token
pub const TOKEN_HEADER: &str = "Sec-WebSocket-Protocol";

/// Client side of a WebSocket connection
#[derive(Debug)]
pub struct WsChannel {
    tx: mpsc::UnboundedSender<String>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl WsChannel {
    /// Connect to `url`, authenticating with `token`
    ///
    /// Returns the channel and a receiver yielding every inbound text
    /// frame. The receiver closes when the server closes the socket.
    pub async fn connect(
        url: &str,
        token: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::InvalidConfig(format!("websocket url: {}", e)))?;
        let header = HeaderValue::from_str(token)
            .map_err(|e| Error::InvalidConfig(format!("bearer token: {}", e)))?;
        request.headers_mut().insert(TOKEN_HEADER, header);

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| Error::ChannelError(format!("connect failed: {}", e)))?;
        let (mut sink, mut stream) = ws_stream.split();

        tracing::debug!(url = url, "WebSocket connected");

        let (tx, mut outbound) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        if inbound_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        tracing::debug!("Server sent close frame");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                    // tungstenite answers pings itself
                    _ => {}
                }
            }
        });

        Ok((Self { tx, writer, reader }, inbound))
    }

    /// Stop both socket tasks
    pub fn close(&self) {
        self.writer.abort();
        self.reader.abort();
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl DuplexChannel for WsChannel {
    async fn send_text(&self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| Error::ChannelError("websocket writer stopped".into()))
    }
}

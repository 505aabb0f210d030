//! Outbound half of the persistent duplex channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::messages::WireMessage;
use crate::crypto::EnvelopeWire;
use crate::error::{Error, Result};

/// Sends JSON frames to the server
///
/// Inbound frames are delivered separately (see
/// [`WsChannel::connect`](super::WsChannel::connect)) and fed to
/// [`SecureSession::handle_inbound`](crate::session::SecureSession::handle_inbound).
#[async_trait]
pub trait DuplexChannel: Send + Sync {
    /// Send one raw JSON frame
    async fn send_text(&self, frame: String) -> Result<()>;

    /// Serialize and send a typed message
    async fn send_message(&self, message: &WireMessage) -> Result<()> {
        self.send_text(message.to_json()?).await
    }

    /// Serialize and send an encrypted envelope
    async fn send_envelope(&self, envelope: &EnvelopeWire) -> Result<()> {
        let frame =
            serde_json::to_string(envelope).map_err(|e| Error::SerializationError(e.to_string()))?;
        self.send_text(frame).await
    }
}

/// In-process channel; the paired receiver sees every sent frame
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<String>,
}

impl MemoryChannel {
    /// Create a channel and the receiver for its frames
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl DuplexChannel for MemoryChannel {
    async fn send_text(&self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| Error::ChannelError("memory channel closed".into()))
    }
}

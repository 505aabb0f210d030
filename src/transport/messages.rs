//! # Wire Messages
//!
//! JSON frames carried on the duplex channel.
//!
//! Every frame is either an encrypted envelope (`"encrypted": true`) or a
//! message tagged by `type`. [`InboundMessage::decode`] tells them apart
//! once, at the transport boundary.
//!
//! | `type` | Direction | Payload |
//! |--------|-----------|---------|
//! | `text` | both | `content` |
//! | `file_upload_init` | client → server | `uploadId`, `fileName`, `mimeType`, `totalSize`, `chatUsername` |
//! | `file_chunk` | both | `uploadId` or `fileId`, `chunkIndex`, `data`, `encoding`, `isLastChunk` |
//! | `file_upload_complete` | server → client | `uploadId`, `fileId`, `fileName` |
//! | `file_info` | server → client | `fileId`, `fileName`, `mimeType`, `fileSize` |
//! | `file_download_request` | client → server | `fileId` |
//! | `file_upload_error` / `file_download_error` | server → client | `error` |
//!
//! Sender identity is always `senderUsername`; the lowercase spelling some
//! clients emit is accepted on input only.

use serde::{Deserialize, Serialize};

use crate::crypto::EnvelopeWire;
use crate::error::{Error, Result};

/// Chunk payload encoding; only base64 is defined
pub const BASE64_ENCODING: &str = "base64";

fn default_encoding() -> String {
    BASE64_ENCODING.to_string()
}

/// Plain chat text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessage {
    /// Message body
    pub content: String,
    /// Sender identity
    #[serde(
        default,
        alias = "senderusername",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_username: Option<String>,
}

/// Announces an outbound upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInit {
    /// Sender-generated transfer id
    pub upload_id: String,
    /// File name
    pub file_name: String,
    /// MIME type
    pub mime_type: String,
    /// Size of the whole file in bytes
    pub total_size: u64,
    /// Conversation the file belongs to
    pub chat_username: String,
}

/// One slice of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFrame {
    /// Set on upload chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    /// Set on download chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Zero-based position
    pub chunk_index: u32,
    /// Encoded chunk bytes
    pub data: String,
    /// Encoding of `data`
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Marks the terminal chunk
    #[serde(default)]
    pub is_last_chunk: bool,
}

impl ChunkFrame {
    /// The transfer this chunk belongs to, upload id first
    pub fn transfer_id(&self) -> Option<&str> {
        self.upload_id.as_deref().or(self.file_id.as_deref())
    }
}

/// Server confirmation that an upload was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadComplete {
    /// Transfer id chosen by the uploader
    pub upload_id: String,
    /// Server-assigned file id
    pub file_id: String,
    /// File name
    pub file_name: String,
}

/// Metadata preceding a download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Server-assigned file id; the download's transfer id
    pub file_id: String,
    /// File name
    pub file_name: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes
    pub file_size: u64,
}

/// Request a stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// File to stream back
    pub file_id: String,
}

/// Explicit failure reported by the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSignal {
    /// Human-readable reason
    pub error: String,
    /// Failed upload, when the server names it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    /// Failed download, when the server names it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

impl ErrorSignal {
    /// The transfer named by the signal, if any
    pub fn transfer_id(&self) -> Option<&str> {
        self.upload_id.as_deref().or(self.file_id.as_deref())
    }
}

/// Typed frames, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Plain chat text
    Text(TextMessage),
    /// Upload announcement
    FileUploadInit(UploadInit),
    /// File chunk
    FileChunk(ChunkFrame),
    /// Upload stored by the server
    FileUploadComplete(UploadComplete),
    /// Download metadata
    FileInfo(FileInfo),
    /// Download request
    FileDownloadRequest(DownloadRequest),
    /// Upload failed
    FileUploadError(ErrorSignal),
    /// Download failed
    FileDownloadError(ErrorSignal),
}

impl WireMessage {
    /// Serialize to a JSON frame
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::SerializationError(e.to_string()))
    }
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Encrypted envelope
    Envelope(EnvelopeWire),
    /// Typed message
    Message(WireMessage),
}

impl InboundMessage {
    /// Decode a JSON frame
    pub fn decode(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let encrypted = value
            .get("encrypted")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        if encrypted {
            let envelope: EnvelopeWire = serde_json::from_value(value)
                .map_err(|e| Error::MalformedEnvelope(e.to_string()))?;
            Ok(InboundMessage::Envelope(envelope))
        } else {
            let message: WireMessage = serde_json::from_value(value)?;
            Ok(InboundMessage::Message(message))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

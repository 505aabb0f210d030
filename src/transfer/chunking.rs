//! Splitting buffers into chunks and decoding chunk payloads.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{Error, Result};
use crate::transport::messages::{ChunkFrame, BASE64_ENCODING};

/// One ordered slice of an outgoing buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position
    pub index: u32,
    /// Raw bytes
    pub bytes: Vec<u8>,
    /// Set only on the final chunk
    pub is_last: bool,
}

impl Chunk {
    /// Encode as an upload chunk frame
    pub fn to_upload_frame(&self, upload_id: &str) -> ChunkFrame {
        ChunkFrame {
            upload_id: Some(upload_id.to_string()),
            file_id: None,
            chunk_index: self.index,
            data: BASE64.encode(&self.bytes),
            encoding: BASE64_ENCODING.to_string(),
            is_last_chunk: self.is_last,
        }
    }
}

/// Split `data` into zero-indexed chunks of at most `chunk_size` bytes
///
/// An empty buffer yields no chunks.
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(Error::InvalidTransfer("chunk size must be positive".into()));
    }

    let count = data.len().div_ceil(chunk_size);
    if count > u32::MAX as usize {
        return Err(Error::InvalidTransfer(format!(
            "{} chunks exceed the index range",
            count
        )));
    }

    Ok(data
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, bytes)| Chunk {
            index: i as u32,
            bytes: bytes.to_vec(),
            is_last: i + 1 == count,
        })
        .collect())
}

/// Decode the payload of an inbound chunk
pub fn decode_payload(frame: &ChunkFrame) -> Result<Vec<u8>> {
    if !frame.encoding.eq_ignore_ascii_case(BASE64_ENCODING) {
        return Err(Error::ChunkDecodeError {
            chunk_index: frame.chunk_index,
            reason: format!("unsupported encoding {}", frame.encoding),
        });
    }

    BASE64
        .decode(frame.data.as_bytes())
        .map_err(|e| Error::ChunkDecodeError {
            chunk_index: frame.chunk_index,
            reason: e.to_string(),
        })
}

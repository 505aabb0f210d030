//! # Transfer Module
//!
//! Chunked file transfer over the message-oriented duplex channel.
//!
//! ## Send path
//!
//! ```text
//! bytes ─► split (chunk_size) ─► file_upload_init ─► file_chunk 0 ─► delay ─► ... ─► file_chunk n (isLastChunk)
//! ```
//!
//! ## Receive path
//!
//! ```text
//! file_info / file_upload_init ─► job registered
//! file_chunk ─► decode ─┬─ ok ──► chunks[index] = bytes
//!                       └─ err ─► slot left absent, transfer continues
//! terminal chunk seen ─► expected = lastIndex + 1
//! valid / expected >= threshold ─► concatenate present chunks ─► Complete
//! ```
//!
//! Reassembly is lossy above the threshold: absent chunks are skipped and
//! no end-to-end checksum is enforced. An explicit error signal from the
//! channel fails the job and releases its buffers.

mod chunking;
mod job;
mod manager;

pub use chunking::{decode_payload, split_into_chunks, Chunk};
pub use job::{
    ChunkOutcome, TransferDirection, TransferJob, TransferMeta, TransferProgress, TransferStatus,
};
pub use manager::{OutgoingFile, TransferManager};

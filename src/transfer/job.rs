//! Per-transfer reassembly state.
//!
//! ## Acceptance policy
//!
//! Completion is evaluated when the terminal chunk arrives and again on
//! every later chunk while the job is still in progress. Only slots in
//! `[0, lastIndex]` count; a slot is valid when it is present and
//! non-empty. The job completes once `valid / expected >= threshold`.
//! Chunks beyond `lastIndex` are ignored, and a finished job ignores
//! everything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

/// Which way the bytes flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// We send chunks
    Upload,
    /// We receive chunks
    Download,
}

/// Lifecycle of a job; never returns to `InProgress`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Chunks still flowing
    InProgress,
    /// Accepted (inbound) or acknowledged (outbound)
    Complete,
    /// Explicit failure; buffers released
    Failed,
}

/// File metadata announced for a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMeta {
    /// File name
    pub file_name: String,
    /// MIME type
    pub mime_type: String,
    /// Announced size in bytes
    pub total_size: u64,
}

/// Counters for a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    /// Distinct slots received
    pub received: u32,
    /// Present, non-empty slots within the expected range
    pub valid: u32,
    /// Chunks whose payload failed to decode
    pub dropped: u32,
    /// Chunks sent (outbound jobs)
    pub sent: u32,
    /// Known once the terminal chunk arrived
    pub expected: Option<u32>,
}

/// Result of feeding one chunk to a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Stored; job still in progress
    Pending(TransferProgress),
    /// Threshold met; the reassembled file
    Completed {
        /// Transfer id
        transfer_id: String,
        /// Present chunks in index order
        data: Vec<u8>,
        /// Counters at completion
        progress: TransferProgress,
    },
    /// Payload could not be decoded; slot left absent
    Dropped {
        /// Index of the corrupt chunk
        chunk_index: u32,
    },
    /// Job already finished, or chunk past the terminal index
    Ignored,
}

/// One file transfer
#[derive(Debug)]
pub struct TransferJob {
    id: String,
    direction: TransferDirection,
    meta: Option<TransferMeta>,
    status: TransferStatus,
    chunks: BTreeMap<u32, Vec<u8>>,
    expected: Option<u32>,
    dropped: u32,
    sent: u32,
    created_at: i64,
    updated_at: i64,
}

impl TransferJob {
    /// Start a job
    pub fn new(id: impl Into<String>, direction: TransferDirection, meta: Option<TransferMeta>) -> Self {
        let now = now_timestamp_millis();
        Self {
            id: id.into(),
            direction,
            meta,
            status: TransferStatus::InProgress,
            chunks: BTreeMap::new(),
            expected: None,
            dropped: 0,
            sent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transfer id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Direction
    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    /// Announced metadata
    pub fn meta(&self) -> Option<&TransferMeta> {
        self.meta.as_ref()
    }

    /// Current status
    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// Whether chunks are still accepted
    pub fn is_in_progress(&self) -> bool {
        self.status == TransferStatus::InProgress
    }

    /// Creation time, unix millis
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Last change, unix millis
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Milliseconds since the last change, as of `now` (unix millis)
    pub fn idle_for(&self, now: i64) -> u64 {
        u64::try_from(now - self.updated_at).unwrap_or(0)
    }

    /// Attach metadata that arrived after the first chunk
    pub fn set_meta(&mut self, meta: TransferMeta) {
        self.meta = Some(meta);
        self.touch();
    }

    /// Current counters
    pub fn progress(&self) -> TransferProgress {
        TransferProgress {
            received: self.chunks.len() as u32,
            valid: self.valid_count(),
            dropped: self.dropped,
            sent: self.sent,
            expected: self.expected,
        }
    }

    /// Feed one inbound chunk
    ///
    /// `payload` is the decoded chunk bytes, or the decode error.
    pub fn accept(
        &mut self,
        chunk_index: u32,
        payload: Result<Vec<u8>>,
        is_last: bool,
        threshold: f64,
    ) -> ChunkOutcome {
        if !self.is_in_progress() {
            return ChunkOutcome::Ignored;
        }
        if let Some(expected) = self.expected {
            if chunk_index >= expected {
                return ChunkOutcome::Ignored;
            }
        }

        self.touch();

        if is_last && self.expected.is_none() {
            self.expected = Some(chunk_index.saturating_add(1));
            // Anything stored past the terminal index never counts
            let _beyond = self.chunks.split_off(&chunk_index.saturating_add(1));
        }

        let dropped = match payload {
            Ok(bytes) => {
                self.chunks.insert(chunk_index, bytes);
                false
            }
            Err(_) => {
                self.dropped += 1;
                true
            }
        };

        if self.expected.is_some() {
            if let Ok(data) = self.try_assemble(threshold) {
                let progress = self.progress();
                self.finish(TransferStatus::Complete);
                return ChunkOutcome::Completed {
                    transfer_id: self.id.clone(),
                    data,
                    progress,
                };
            }
        }

        if dropped {
            ChunkOutcome::Dropped { chunk_index }
        } else {
            ChunkOutcome::Pending(self.progress())
        }
    }

    /// Concatenate present chunks if the threshold is met
    ///
    /// Fails with `InsufficientChunks` while below the threshold, and
    /// before the terminal chunk has arrived (expected reported as 0).
    pub fn try_assemble(&self, threshold: f64) -> Result<Vec<u8>> {
        let valid = self.valid_count();
        let expected = match self.expected {
            Some(expected) if expected > 0 => expected,
            _ => return Err(Error::InsufficientChunks { valid, expected: 0 }),
        };

        if f64::from(valid) / f64::from(expected) < threshold {
            return Err(Error::InsufficientChunks { valid, expected });
        }

        Ok(self
            .chunks
            .range(..expected)
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect())
    }

    /// Count one outbound chunk as sent
    pub fn record_sent(&mut self) {
        self.sent += 1;
        self.touch();
    }

    /// Outbound upload confirmed by the server
    pub fn acknowledge(&mut self) -> bool {
        if !self.is_in_progress() {
            return false;
        }
        self.finish(TransferStatus::Complete);
        true
    }

    /// Mark failed and drop buffered chunks; false if already finished
    pub fn fail(&mut self) -> bool {
        if !self.is_in_progress() {
            return false;
        }
        self.finish(TransferStatus::Failed);
        true
    }

    fn finish(&mut self, status: TransferStatus) {
        self.status = status;
        self.chunks.clear();
        self.touch();
    }

    fn valid_count(&self) -> u32 {
        let upper = self.expected.unwrap_or(u32::MAX);
        self.chunks
            .range(..upper)
            .filter(|(_, bytes)| !bytes.is_empty())
            .count() as u32
    }

    fn touch(&mut self) {
        self.updated_at = now_timestamp_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TransferJob {
        TransferJob::new("f1", TransferDirection::Download, None)
    }

    fn bad(index: u32) -> Result<Vec<u8>> {
        Err(Error::ChunkDecodeError {
            chunk_index: index,
            reason: "bad".into(),
        })
    }

    #[test]
    fn test_complete_in_order() {
        let mut job = job();
        assert!(matches!(
            job.accept(0, Ok(vec![1, 2]), false, 1.0),
            ChunkOutcome::Pending(TransferProgress { received: 1, .. })
        ));

        match job.accept(1, Ok(vec![3]), true, 1.0) {
            ChunkOutcome::Completed { transfer_id, data, progress } => {
                assert_eq!(transfer_id, "f1");
                assert_eq!(data, vec![1, 2, 3]);
                assert_eq!(progress.expected, Some(2));
                assert_eq!(progress.valid, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(job.status(), TransferStatus::Complete);
        // Buffers released
        assert_eq!(job.progress().received, 0);
    }

    #[test]
    fn test_out_of_order_reassembly() {
        let mut job = job();
        job.accept(2, Ok(vec![5]), true, 1.0);
        job.accept(0, Ok(vec![1]), false, 1.0);
        match job.accept(1, Ok(vec![3]), false, 1.0) {
            ChunkOutcome::Completed { data, .. } => assert_eq!(data, vec![1, 3, 5]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tolerates_missing_chunk() {
        // 10 chunks, index 4 never arrives
        let mut job = job();
        for i in 0..9u32 {
            if i != 4 {
                job.accept(i, Ok(vec![i as u8]), false, 0.3);
            }
        }
        match job.accept(9, Ok(vec![9]), true, 0.3) {
            ChunkOutcome::Completed { data, progress, .. } => {
                assert_eq!(data, vec![0, 1, 2, 3, 5, 6, 7, 8, 9]);
                assert_eq!(progress.valid, 9);
                assert_eq!(progress.expected, Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_below_threshold_stays_pending() {
        let mut job = job();
        match job.accept(9, Ok(vec![9]), true, 0.3) {
            ChunkOutcome::Pending(progress) => {
                assert_eq!(progress.valid, 1);
                assert_eq!(progress.expected, Some(10));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            job.try_assemble(0.3),
            Err(Error::InsufficientChunks { valid: 1, expected: 10 })
        ));

        // Later chunks re-evaluate the threshold
        assert!(matches!(job.accept(0, Ok(vec![0]), false, 0.3), ChunkOutcome::Pending(_)));
        assert!(matches!(
            job.accept(1, Ok(vec![1]), false, 0.3),
            ChunkOutcome::Completed { .. }
        ));
        assert_eq!(job.status(), TransferStatus::Complete);
    }

    #[test]
    fn test_corrupt_chunk_dropped() {
        let mut job = job();
        job.accept(0, Ok(vec![1]), false, 1.0);
        assert_eq!(
            job.accept(1, bad(1), false, 1.0),
            ChunkOutcome::Dropped { chunk_index: 1 }
        );
        assert_eq!(job.progress().dropped, 1);
        assert_eq!(job.progress().received, 1);
        assert!(job.is_in_progress());
    }

    #[test]
    fn test_corrupt_terminal_chunk_sets_expected() {
        let mut job = job();
        job.accept(0, Ok(vec![1]), false, 0.5);
        match job.accept(1, bad(1), true, 0.5) {
            ChunkOutcome::Completed { data, progress, .. } => {
                assert_eq!(data, vec![1]);
                assert_eq!(progress.dropped, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_slots_do_not_count() {
        let mut job = job();
        job.accept(0, Ok(vec![]), false, 1.0);
        match job.accept(1, Ok(vec![2]), true, 1.0) {
            ChunkOutcome::Pending(progress) => {
                assert_eq!(progress.received, 2);
                assert_eq!(progress.valid, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_chunks_past_terminal_ignored() {
        let mut job = job();
        job.accept(5, Ok(vec![5]), false, 1.0);
        job.accept(1, Ok(vec![1]), true, 1.0);
        // Index 5 discarded once the terminal index is known
        assert_eq!(job.progress().received, 1);
        assert_eq!(job.accept(3, Ok(vec![3]), false, 1.0), ChunkOutcome::Ignored);
    }

    #[test]
    fn test_finished_job_ignores_chunks() {
        let mut job = job();
        job.accept(0, Ok(vec![1]), true, 1.0);
        assert_eq!(job.accept(0, Ok(vec![1]), true, 1.0), ChunkOutcome::Ignored);

        let mut failed = TransferJob::new("f2", TransferDirection::Download, None);
        failed.accept(0, Ok(vec![1]), false, 1.0);
        assert!(failed.fail());
        assert!(!failed.fail());
        assert_eq!(failed.status(), TransferStatus::Failed);
        assert_eq!(failed.progress().received, 0);
        assert_eq!(failed.accept(1, Ok(vec![1]), true, 1.0), ChunkOutcome::Ignored);
    }

    #[test]
    fn test_try_assemble_before_terminal() {
        let mut job = job();
        job.accept(0, Ok(vec![1]), false, 0.3);
        assert!(matches!(
            job.try_assemble(0.3),
            Err(Error::InsufficientChunks { valid: 1, expected: 0 })
        ));
    }

    #[test]
    fn test_outbound_acknowledge() {
        let meta = TransferMeta {
            file_name: "a.txt".into(),
            mime_type: "text/plain".into(),
            total_size: 3,
        };
        let mut job = TransferJob::new("u1", TransferDirection::Upload, Some(meta));
        job.record_sent();
        job.record_sent();
        assert_eq!(job.progress().sent, 2);
        assert_eq!(job.meta().map(|m| m.total_size), Some(3));

        assert!(job.acknowledge());
        assert_eq!(job.status(), TransferStatus::Complete);
        assert!(!job.acknowledge());
    }

    #[test]
    fn test_idle_for_tracks_last_change() {
        let mut job = job();
        let touched = job.updated_at();
        assert_eq!(job.idle_for(touched + 500), 500);
        // A clock behind the last change reads as not idle
        assert_eq!(job.idle_for(touched - 10), 0);

        job.accept(0, Ok(vec![1]), false, 1.0);
        assert!(job.updated_at() >= touched);
    }
}

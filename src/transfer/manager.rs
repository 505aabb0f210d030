//! Transfer manager: owns every job and drives both directions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::chunking::{decode_payload, split_into_chunks};
use super::job::{
    ChunkOutcome, TransferDirection, TransferJob, TransferMeta, TransferProgress, TransferStatus,
};
use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::time::{elapsed_millis, now_timestamp_millis};
use crate::transport::messages::{ChunkFrame, ErrorSignal, FileInfo, UploadInit, WireMessage};
use crate::transport::{DuplexChannel, Registry};

type JobHandle = Arc<Mutex<TransferJob>>;

/// Finished transfers remembered after they leave the registry
pub const FINISHED_RETENTION: usize = 256;

/// A file to upload
#[derive(Debug, Clone)]
pub struct OutgoingFile {
    /// File name
    pub file_name: String,
    /// MIME type
    pub mime_type: String,
    /// Conversation the file belongs to
    pub chat_username: String,
    /// File contents
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct FinishedJob {
    status: TransferStatus,
    meta: Option<TransferMeta>,
    progress: TransferProgress,
}

/// Most recent finished jobs, oldest evicted first
#[derive(Debug, Default)]
struct FinishedLog {
    order: VecDeque<String>,
    jobs: HashMap<String, FinishedJob>,
}

impl FinishedLog {
    fn record(&mut self, id: String, job: FinishedJob) {
        if self.jobs.insert(id.clone(), job).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > FINISHED_RETENTION {
            if let Some(oldest) = self.order.pop_front() {
                self.jobs.remove(&oldest);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&FinishedJob> {
        self.jobs.get(id)
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.jobs.remove(id).is_none() {
            return false;
        }
        self.order.retain(|k| k != id);
        true
    }
}

/// Chunked transfer manager
///
/// A job leaves the registry as soon as it completes or fails. The last
/// [`FINISHED_RETENTION`] finished ids are remembered so late chunks are
/// ignored instead of reported as unknown. Removing a job with
/// [`TransferManager::cancel`] stops local handling only.
pub struct TransferManager {
    config: TransferConfig,
    jobs: Registry<String, JobHandle>,
    finished: Mutex<FinishedLog>,
}

impl TransferManager {
    /// Create a manager
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            jobs: Registry::new(),
            finished: Mutex::new(FinishedLog::default()),
        }
    }

    /// Transfer settings
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Upload a file over `channel`
    ///
    /// Sends `file_upload_init`, then every chunk with the configured delay
    /// in between. Returns the upload id; the job completes when the
    /// server acknowledges it. A channel failure marks the job failed.
    pub async fn send_file(&self, channel: &dyn DuplexChannel, file: OutgoingFile) -> Result<String> {
        if file.data.is_empty() {
            return Err(Error::InvalidTransfer("cannot send an empty file".into()));
        }
        let chunks = split_into_chunks(&file.data, self.config.chunk_size)?;

        let upload_id = Uuid::new_v4().to_string();
        let meta = TransferMeta {
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            total_size: file.data.len() as u64,
        };
        let job = Arc::new(Mutex::new(TransferJob::new(
            upload_id.clone(),
            TransferDirection::Upload,
            Some(meta),
        )));
        self.jobs.register(upload_id.clone(), job.clone())?;

        tracing::debug!(
            transfer_id = %upload_id,
            chunks = chunks.len(),
            size = file.data.len(),
            "Starting upload"
        );

        let init = WireMessage::FileUploadInit(UploadInit {
            upload_id: upload_id.clone(),
            file_name: file.file_name,
            mime_type: file.mime_type,
            total_size: file.data.len() as u64,
            chat_username: file.chat_username,
        });
        if let Err(e) = channel.send_message(&init).await {
            self.fail_job(&mut job.lock());
            return Err(e);
        }

        let delay = self.config.inter_chunk_delay();
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            if !self.jobs.contains(&upload_id) || !job.lock().is_in_progress() {
                tracing::debug!(transfer_id = %upload_id, "Upload stopped locally");
                return Err(Error::InvalidTransfer(format!("upload {} was cancelled", upload_id)));
            }

            let frame = WireMessage::FileChunk(chunk.to_upload_frame(&upload_id));
            if let Err(e) = channel.send_message(&frame).await {
                tracing::warn!(transfer_id = %upload_id, chunk_index = chunk.index, error = %e, "Chunk send failed");
                self.fail_job(&mut job.lock());
                return Err(e);
            }
            job.lock().record_sent();
            tracing::debug!(transfer_id = %upload_id, chunk_index = chunk.index, "Chunk sent");

            if i < last && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(upload_id)
    }

    /// Start receiving a download announced by `file_info`
    pub fn begin_download(&self, info: &FileInfo) -> Result<()> {
        self.begin_inbound(
            &info.file_id,
            TransferMeta {
                file_name: info.file_name.clone(),
                mime_type: info.mime_type.clone(),
                total_size: info.file_size,
            },
        )
    }

    /// Start receiving an upload announced by a peer
    pub fn begin_incoming(&self, init: &UploadInit) -> Result<()> {
        self.begin_inbound(
            &init.upload_id,
            TransferMeta {
                file_name: init.file_name.clone(),
                mime_type: init.mime_type.clone(),
                total_size: init.total_size,
            },
        )
    }

    fn begin_inbound(&self, id: &str, meta: TransferMeta) -> Result<()> {
        let id = id.to_string();
        let job = TransferJob::new(id.clone(), TransferDirection::Download, Some(meta));
        // A running job keeps its id; a finished one may be fetched again
        self.jobs.register(id.clone(), Arc::new(Mutex::new(job)))?;
        self.finished.lock().remove(&id);
        tracing::debug!(transfer_id = %id, "Inbound transfer registered");
        Ok(())
    }

    /// Feed one inbound chunk to its job
    pub fn receive_chunk(&self, frame: &ChunkFrame) -> Result<ChunkOutcome> {
        let id = frame
            .transfer_id()
            .ok_or_else(|| Error::InvalidTransfer("chunk has no transfer id".into()))?;
        let job = match self.jobs.get(&id.to_string()) {
            Some(job) => job,
            None if self.finished.lock().get(id).is_some() => {
                tracing::debug!(transfer_id = %id, chunk_index = frame.chunk_index, "Chunk for finished transfer ignored");
                return Ok(ChunkOutcome::Ignored);
            }
            None => return Err(Error::TransferNotFound(id.to_string())),
        };

        let payload = decode_payload(frame);
        if let Err(e) = &payload {
            tracing::warn!(transfer_id = %id, chunk_index = frame.chunk_index, error = %e, "Dropping corrupt chunk");
        }

        let (outcome, started) = {
            let mut job = job.lock();
            let outcome = job.accept(
                frame.chunk_index,
                payload,
                frame.is_last_chunk,
                self.config.acceptance_threshold,
            );
            if let ChunkOutcome::Completed { progress, .. } = &outcome {
                self.retire(&job, *progress);
            }
            (outcome, job.created_at())
        };

        match &outcome {
            ChunkOutcome::Completed { data, progress, .. } => {
                tracing::info!(
                    transfer_id = %id,
                    bytes = data.len(),
                    elapsed_ms = elapsed_millis(started),
                    valid = progress.valid,
                    expected = progress.expected.unwrap_or(0),
                    "Transfer complete"
                );
            }
            ChunkOutcome::Pending(progress) => {
                tracing::debug!(
                    transfer_id = %id,
                    chunk_index = frame.chunk_index,
                    received = progress.received,
                    "Chunk stored"
                );
            }
            ChunkOutcome::Ignored => {
                tracing::debug!(transfer_id = %id, chunk_index = frame.chunk_index, "Chunk ignored");
            }
            ChunkOutcome::Dropped { .. } => {}
        }

        Ok(outcome)
    }

    /// Mark an upload confirmed by the server
    pub fn acknowledge_upload(&self, upload_id: &str) -> Result<bool> {
        let job = match self.jobs.get(&upload_id.to_string()) {
            Some(job) => job,
            None if self.finished.lock().get(upload_id).is_some() => return Ok(false),
            None => return Err(Error::TransferNotFound(upload_id.to_string())),
        };

        let mut job = job.lock();
        let progress = job.progress();
        let acknowledged = job.acknowledge();
        if acknowledged {
            self.retire(&job, progress);
            tracing::info!(transfer_id = %upload_id, "Upload acknowledged");
        }
        Ok(acknowledged)
    }

    /// Fail one job, releasing its buffers
    pub fn fail(&self, id: &str) -> Result<bool> {
        let job = match self.jobs.get(&id.to_string()) {
            Some(job) => job,
            None if self.finished.lock().get(id).is_some() => return Ok(false),
            None => return Err(Error::TransferNotFound(id.to_string())),
        };

        let failed = self.fail_job(&mut job.lock());
        if failed {
            tracing::warn!(transfer_id = %id, "Transfer failed");
        }
        Ok(failed)
    }

    /// Apply an error signal from the channel
    ///
    /// A signal naming a transfer fails that job, and a signal without an
    /// id fails every in-progress job. Either way only jobs of `direction`
    /// are touched. Returns the failed ids.
    pub fn fail_matching(&self, signal: &ErrorSignal, direction: TransferDirection) -> Vec<String> {
        let candidates: Vec<JobHandle> = match signal.transfer_id() {
            Some(id) => self.jobs.get(&id.to_string()).into_iter().collect(),
            None => self.jobs.handlers(),
        };

        let mut failed = Vec::new();
        for job in candidates {
            let mut job = job.lock();
            if job.direction() == direction && self.fail_job(&mut job) {
                failed.push(job.id().to_string());
            }
        }

        if !failed.is_empty() {
            tracing::warn!(error = %signal.error, count = failed.len(), "Transfers failed by channel");
        }
        failed
    }

    /// Fail every job that has been idle for the configured timeout
    pub fn sweep_idle(&self) -> Vec<String> {
        self.sweep_idle_at(now_timestamp_millis())
    }

    /// [`TransferManager::sweep_idle`] against an explicit clock (unix millis)
    pub fn sweep_idle_at(&self, now: i64) -> Vec<String> {
        let timeout = self.config.idle_timeout_ms;
        if timeout == 0 {
            return Vec::new();
        }

        let mut expired = Vec::new();
        for job in self.jobs.handlers() {
            let mut job = job.lock();
            if job.idle_for(now) >= timeout && self.fail_job(&mut job) {
                expired.push(job.id().to_string());
            }
        }

        if !expired.is_empty() {
            tracing::warn!(count = expired.len(), timeout_ms = timeout, "Idle transfers expired");
        }
        expired
    }

    /// Stop handling a transfer; the remote party is not told
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.jobs.unregister(&id.to_string());
        let forgotten = self.finished.lock().remove(id);
        if removed {
            tracing::debug!(transfer_id = %id, "Transfer handler removed");
        }
        removed || forgotten
    }

    /// Status of a job
    pub fn status(&self, id: &str) -> Option<TransferStatus> {
        match self.jobs.get(&id.to_string()) {
            Some(job) => Some(job.lock().status()),
            None => self.finished.lock().get(id).map(|done| done.status),
        }
    }

    /// Counters of a job
    pub fn progress(&self, id: &str) -> Option<TransferProgress> {
        match self.jobs.get(&id.to_string()) {
            Some(job) => Some(job.lock().progress()),
            None => self.finished.lock().get(id).map(|done| done.progress),
        }
    }

    /// Metadata of a job
    pub fn meta(&self, id: &str) -> Option<TransferMeta> {
        match self.jobs.get(&id.to_string()) {
            Some(job) => job.lock().meta().cloned(),
            None => self.finished.lock().get(id).and_then(|done| done.meta.clone()),
        }
    }

    /// Ids of jobs still in progress
    pub fn active(&self) -> Vec<String> {
        self.jobs
            .handlers()
            .into_iter()
            .filter_map(|job| {
                let job = job.lock();
                job.is_in_progress().then(|| job.id().to_string())
            })
            .collect()
    }

    /// Registered jobs, finished ones excluded
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no job is registered
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    fn fail_job(&self, job: &mut TransferJob) -> bool {
        let progress = job.progress();
        if !job.fail() {
            return false;
        }
        self.retire(job, progress);
        true
    }

    /// Move a finished job from the registry to the finished log
    ///
    /// The log entry is written before the id is released, so a job
    /// registered under the same id afterwards always clears it.
    fn retire(&self, job: &TransferJob, progress: TransferProgress) {
        let id = job.id().to_string();
        self.finished.lock().record(
            id.clone(),
            FinishedJob {
                status: job.status(),
                meta: job.meta().cloned(),
                progress,
            },
        );
        self.jobs.unregister(&id);
    }
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field("config", &self.config)
            .field("jobs", &self.jobs.len())
            .field("finished", &self.finished.lock().jobs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{InboundMessage, MemoryChannel};

    fn config(chunk_size: usize) -> TransferConfig {
        TransferConfig {
            chunk_size,
            ..TransferConfig::default()
        }
    }

    fn file(data: Vec<u8>) -> OutgoingFile {
        OutgoingFile {
            file_name: "photo.png".into(),
            mime_type: "image/png".into(),
            chat_username: "bob".into(),
            data,
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<WireMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            match InboundMessage::decode(&frame).unwrap() {
                InboundMessage::Message(msg) => out.push(msg),
                other => panic!("unexpected {:?}", other),
            }
        }
        out
    }

    fn download_chunk(id: &str, index: u32, data: &str, last: bool) -> ChunkFrame {
        ChunkFrame {
            upload_id: None,
            file_id: Some(id.into()),
            chunk_index: index,
            data: data.into(),
            encoding: "base64".into(),
            is_last_chunk: last,
        }
    }

    fn info(id: &str) -> FileInfo {
        FileInfo {
            file_id: id.into(),
            file_name: "doc.pdf".into(),
            mime_type: "application/pdf".into(),
            file_size: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_file_frames() {
        let manager = TransferManager::new(config(64));
        let (channel, mut rx) = MemoryChannel::new();

        let data: Vec<u8> = (0..150u8).collect();
        let id = manager.send_file(&channel, file(data)).await.unwrap();

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 4);
        match &frames[0] {
            WireMessage::FileUploadInit(init) => {
                assert_eq!(init.upload_id, id);
                assert_eq!(init.total_size, 150);
                assert_eq!(init.chat_username, "bob");
            }
            other => panic!("unexpected {:?}", other),
        }
        let lasts: Vec<bool> = frames[1..]
            .iter()
            .map(|f| match f {
                WireMessage::FileChunk(c) => c.is_last_chunk,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(lasts, vec![false, false, true]);

        assert_eq!(manager.progress(&id).unwrap().sent, 3);
        assert_eq!(manager.status(&id), Some(TransferStatus::InProgress));

        assert!(manager.acknowledge_upload(&id).unwrap());
        assert_eq!(manager.status(&id), Some(TransferStatus::Complete));
    }

    #[tokio::test]
    async fn test_send_rejects_empty_file() {
        let manager = TransferManager::new(config(64));
        let (channel, _rx) = MemoryChannel::new();
        assert!(matches!(
            manager.send_file(&channel, file(vec![])).await,
            Err(Error::InvalidTransfer(_))
        ));
        assert!(manager.active().is_empty());
    }

    #[tokio::test]
    async fn test_send_channel_failure_marks_failed() {
        let manager = TransferManager::new(config(64));
        let (channel, rx) = MemoryChannel::new();
        drop(rx);

        let err = manager.send_file(&channel, file(vec![1; 10])).await.unwrap_err();
        assert!(matches!(err, Error::ChannelError(_)));
        assert!(manager.active().is_empty());
    }

    #[test]
    fn test_download_reassembly() {
        let manager = TransferManager::new(config(64));
        manager.begin_download(&info("f1")).unwrap();

        assert!(matches!(
            manager.receive_chunk(&download_chunk("f1", 0, "AAE=", false)).unwrap(),
            ChunkOutcome::Pending(_)
        ));
        match manager.receive_chunk(&download_chunk("f1", 1, "Ag==", true)).unwrap() {
            ChunkOutcome::Completed { transfer_id, data, .. } => {
                assert_eq!(transfer_id, "f1");
                assert_eq!(data, vec![0, 1, 2]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(manager.status("f1"), Some(TransferStatus::Complete));
        assert_eq!(manager.meta("f1").unwrap().file_name, "doc.pdf");

        // Late duplicates are ignored, not errors
        assert_eq!(
            manager.receive_chunk(&download_chunk("f1", 1, "Ag==", true)).unwrap(),
            ChunkOutcome::Ignored
        );
    }

    #[test]
    fn test_corrupt_chunk_continues() {
        let manager = TransferManager::new(TransferConfig {
            acceptance_threshold: 0.5,
            ..config(64)
        });
        manager.begin_download(&info("f1")).unwrap();

        assert_eq!(
            manager.receive_chunk(&download_chunk("f1", 0, "!!", false)).unwrap(),
            ChunkOutcome::Dropped { chunk_index: 0 }
        );
        assert!(matches!(
            manager.receive_chunk(&download_chunk("f1", 1, "Ag==", true)).unwrap(),
            ChunkOutcome::Completed { .. }
        ));
    }

    #[test]
    fn test_unknown_transfer() {
        let manager = TransferManager::new(config(64));
        assert!(matches!(
            manager.receive_chunk(&download_chunk("nope", 0, "AA==", true)),
            Err(Error::TransferNotFound(_))
        ));
        assert!(matches!(manager.fail("nope"), Err(Error::TransferNotFound(_))));
    }

    #[test]
    fn test_duplicate_download_registration() {
        let manager = TransferManager::new(config(64));
        manager.begin_download(&info("f1")).unwrap();
        assert!(matches!(
            manager.begin_download(&info("f1")),
            Err(Error::RegistryConflict(_))
        ));

        // Once finished, the same file may be fetched again
        manager.fail("f1").unwrap();
        manager.begin_download(&info("f1")).unwrap();
        assert_eq!(manager.status("f1"), Some(TransferStatus::InProgress));
    }

    #[test]
    fn test_error_signal_without_id() {
        let manager = TransferManager::new(config(64));
        manager.begin_download(&info("f1")).unwrap();
        manager.begin_download(&info("f2")).unwrap();

        let signal = ErrorSignal {
            error: "storage offline".into(),
            upload_id: None,
            file_id: None,
        };
        let mut failed = manager.fail_matching(&signal, TransferDirection::Download);
        failed.sort();
        assert_eq!(failed, vec!["f1".to_string(), "f2".to_string()]);
        assert_eq!(manager.status("f1"), Some(TransferStatus::Failed));

        // Nothing left to fail
        assert!(manager.fail_matching(&signal, TransferDirection::Download).is_empty());
    }

    #[test]
    fn test_error_signal_with_id() {
        let manager = TransferManager::new(config(64));
        manager.begin_download(&info("f1")).unwrap();
        manager.begin_download(&info("f2")).unwrap();

        let signal = ErrorSignal {
            error: "not found".into(),
            upload_id: None,
            file_id: Some("f2".into()),
        };
        assert_eq!(
            manager.fail_matching(&signal, TransferDirection::Download),
            vec!["f2".to_string()]
        );
        assert_eq!(manager.status("f1"), Some(TransferStatus::InProgress));
    }

    #[test]
    fn test_cancel_is_local() {
        let manager = TransferManager::new(config(64));
        manager.begin_download(&info("f1")).unwrap();

        assert!(manager.cancel("f1"));
        assert!(!manager.cancel("f1"));
        assert_eq!(manager.status("f1"), None);
        assert!(matches!(
            manager.receive_chunk(&download_chunk("f1", 0, "AA==", true)),
            Err(Error::TransferNotFound(_))
        ));
    }

    #[test]
    fn test_finished_jobs_leave_registry() {
        let manager = TransferManager::new(config(64));
        let total = FINISHED_RETENTION + 744;
        for i in 0..total {
            let id = format!("f{}", i);
            manager.begin_download(&info(&id)).unwrap();
            assert!(matches!(
                manager.receive_chunk(&download_chunk(&id, 0, "AQ==", true)).unwrap(),
                ChunkOutcome::Completed { .. }
            ));
        }

        assert!(manager.is_empty());
        assert!(manager.active().is_empty());

        // Recent ids are still known; the oldest were evicted
        let newest = format!("f{}", total - 1);
        assert_eq!(manager.status(&newest), Some(TransferStatus::Complete));
        assert_eq!(
            manager.receive_chunk(&download_chunk(&newest, 0, "AQ==", true)).unwrap(),
            ChunkOutcome::Ignored
        );
        assert_eq!(manager.status("f0"), None);
        assert!(matches!(
            manager.receive_chunk(&download_chunk("f0", 0, "AQ==", true)),
            Err(Error::TransferNotFound(_))
        ));
    }

    #[test]
    fn test_failed_job_leaves_registry() {
        let manager = TransferManager::new(config(64));
        manager.begin_download(&info("f1")).unwrap();
        manager.receive_chunk(&download_chunk("f1", 0, "AQ==", false)).unwrap();

        assert!(manager.fail("f1").unwrap());
        assert!(manager.is_empty());
        assert_eq!(manager.status("f1"), Some(TransferStatus::Failed));
        assert_eq!(manager.progress("f1").unwrap().received, 1);
        assert!(!manager.fail("f1").unwrap());
    }

    #[test]
    fn test_idle_sweep_fails_stalled_jobs() {
        let manager = TransferManager::new(config(64));
        manager.begin_download(&info("f1")).unwrap();
        manager.begin_download(&info("f2")).unwrap();

        let now = now_timestamp_millis();
        assert!(manager.sweep_idle_at(now).is_empty());

        let timeout = manager.config().idle_timeout_ms as i64;
        let mut expired = manager.sweep_idle_at(now + timeout + 1_000);
        expired.sort();
        assert_eq!(expired, vec!["f1".to_string(), "f2".to_string()]);
        assert!(manager.is_empty());
        assert_eq!(manager.status("f1"), Some(TransferStatus::Failed));
        assert_eq!(
            manager.receive_chunk(&download_chunk("f1", 0, "AQ==", true)).unwrap(),
            ChunkOutcome::Ignored
        );
    }

    #[test]
    fn test_idle_sweep_disabled() {
        let manager = TransferManager::new(TransferConfig {
            idle_timeout_ms: 0,
            ..config(64)
        });
        manager.begin_download(&info("f1")).unwrap();
        assert!(manager.sweep_idle_at(now_timestamp_millis() + 3_600_000).is_empty());
        assert_eq!(manager.status("f1"), Some(TransferStatus::InProgress));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_signal_respects_direction() {
        let manager = TransferManager::new(config(64));
        let (channel, _rx) = MemoryChannel::new();
        manager.begin_download(&info("f1")).unwrap();
        let upload = manager.send_file(&channel, file(vec![7; 10])).await.unwrap();

        // An upload error naming the download's id leaves the download alone
        let signal = ErrorSignal {
            error: "upload rejected".into(),
            upload_id: None,
            file_id: Some("f1".into()),
        };
        assert!(manager.fail_matching(&signal, TransferDirection::Upload).is_empty());
        assert_eq!(manager.status("f1"), Some(TransferStatus::InProgress));

        let signal = ErrorSignal {
            error: "upload rejected".into(),
            upload_id: Some(upload.clone()),
            file_id: None,
        };
        assert_eq!(
            manager.fail_matching(&signal, TransferDirection::Upload),
            vec![upload.clone()]
        );
        assert_eq!(manager.status(&upload), Some(TransferStatus::Failed));
        assert_eq!(manager.status("f1"), Some(TransferStatus::InProgress));
    }
}

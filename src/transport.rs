//! Batched delivery of a file set to the remote store.
//!
//! A run sends contiguous slices of the file list under a single transfer id.
//! A failed slice is retried at the same offset with half the size until it
//! goes through or the per-offset timeout runs out.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    time::{Duration, Instant},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    config::TransportConfig,
    merkle_tree::MerkleTreeError,
    node::bytes_base64,
};

/// One file as supplied by the caller and as sent over the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    #[serde(with = "bytes_base64")]
    pub data: Vec<u8>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        FileEntry {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Why a single send attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    Status(StatusCode),
    Io(String),
}

impl SendFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SendFailure::Status(status) => Some(*status),
            SendFailure::Io(_) => None,
        }
    }
}

impl Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendFailure::Status(status) => write!(f, "server responded with non-OK status: {status}"),
            SendFailure::Io(reason) => write!(f, "request failed: {reason}"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("{last_failure} (timeout: {timeout:?} exceeded after {attempts} attempts at item {offset} of transfer {transfer_id})")]
    UploadFailed {
        transfer_id: Uuid,
        offset: usize,
        attempts: usize,
        timeout: Duration,
        last_failure: SendFailure,
    },
    #[error("no file found for id: {0}")]
    RemoteNotFound(String),
    #[error("server responded with non-OK status: {0}")]
    UnexpectedStatus(StatusCode),
    #[error("filename missing from response headers")]
    MissingFileName,
    #[error("failed to encode batch: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Proof(#[from] MerkleTreeError),
}

/// Delivers one serialized batch to the remote store.
///
/// Any status other than `200 OK`, and any `Err`, counts as a failed attempt.
pub trait BatchSender {
    fn send_batch(
        &self,
        url: &str,
        transfer_id: &Uuid,
        payload: &[u8],
        complete: bool,
    ) -> Result<StatusCode, TransportError>;
}

impl<S: BatchSender + ?Sized> BatchSender for &S {
    fn send_batch(
        &self,
        url: &str,
        transfer_id: &Uuid,
        payload: &[u8],
        complete: bool,
    ) -> Result<StatusCode, TransportError> {
        (**self).send_batch(url, transfer_id, payload, complete)
    }
}

/// Classification of one send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Succeeded,
    Retrying(SendFailure),
    TimedOut(SendFailure),
}

/// State of one upload run
#[derive(Debug)]
pub struct TransferJob<'a> {
    pub transfer_id: Uuid,
    pub items: &'a [FileEntry],
    pub cursor: usize,
    pub current_batch_size: usize,
}

impl<'a> TransferJob<'a> {
    pub fn new(items: &'a [FileEntry], batch_size: usize) -> Self {
        TransferJob {
            transfer_id: Uuid::now_v7(),
            items,
            cursor: 0,
            current_batch_size: batch_size.max(1),
        }
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.items.len()
    }

    /// Exclusive end of the batch starting at the cursor
    pub fn batch_end(&self) -> usize {
        self.cursor
            .saturating_add(self.current_batch_size)
            .min(self.items.len())
    }

    pub fn batch(&self) -> &'a [FileEntry] {
        &self.items[self.cursor..self.batch_end()]
    }

    pub fn shrink(&mut self) {
        self.current_batch_size = (self.current_batch_size / 2).max(1);
    }
}

pub struct Uploader<S, C = SystemClock> {
    sender: S,
    clock: C,
    config: TransportConfig,
}

impl<S: BatchSender> Uploader<S, SystemClock> {
    pub fn new(sender: S, config: TransportConfig) -> Self {
        Self::with_clock(sender, SystemClock, config)
    }
}

impl<S: BatchSender, C: Clock> Uploader<S, C> {
    pub fn with_clock(sender: S, clock: C, config: TransportConfig) -> Self {
        Uploader {
            sender,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sends `files` to `endpoint` in batches, returning the transfer id.
    ///
    /// `on_progress` receives the number of items delivered so far after every
    /// successful batch. Items delivered before a failure stay delivered.
    pub fn upload_files(
        &self,
        endpoint: &str,
        files: &[FileEntry],
        mut on_progress: impl FnMut(usize),
    ) -> Result<Uuid, TransportError> {
        let default_batch_size = self.config.batch_size.max(1);
        let mut job = TransferJob::new(files, default_batch_size);
        let url = format!(
            "{}/files/upload-batch/{}",
            endpoint.trim_end_matches('/'),
            job.transfer_id
        );

        while !job.is_done() {
            job.current_batch_size = default_batch_size;
            let started = self.clock.now();
            let mut attempts = 0;

            loop {
                let end = job.batch_end();
                let complete = end == files.len();
                let payload = serde_json::to_vec(job.batch())?;

                let result = self
                    .sender
                    .send_batch(&url, &job.transfer_id, &payload, complete);
                attempts += 1;

                match self.classify(result, started) {
                    BatchOutcome::Succeeded => {
                        debug!(
                            transfer_id = %job.transfer_id,
                            start = job.cursor,
                            end,
                            complete,
                            "batch delivered"
                        );
                        job.cursor = end;
                        on_progress(end);
                        break;
                    }
                    BatchOutcome::Retrying(failure) => {
                        job.shrink();
                        warn!(
                            transfer_id = %job.transfer_id,
                            offset = job.cursor,
                            attempt = attempts,
                            batch_size = job.current_batch_size,
                            "{failure}, retrying with smaller batch"
                        );
                        self.clock.sleep(self.config.retry_interval);
                    }
                    BatchOutcome::TimedOut(last_failure) => {
                        return Err(TransportError::UploadFailed {
                            transfer_id: job.transfer_id,
                            offset: job.cursor,
                            attempts,
                            timeout: self.config.retry_timeout,
                            last_failure,
                        });
                    }
                }
            }
        }

        Ok(job.transfer_id)
    }

    fn classify(
        &self,
        result: Result<StatusCode, TransportError>,
        started: Instant,
    ) -> BatchOutcome {
        let failure = match result {
            Ok(status) if status == StatusCode::OK => return BatchOutcome::Succeeded,
            Ok(status) => SendFailure::Status(status),
            Err(err) => SendFailure::Io(err.to_string()),
        };

        if self.clock.now().duration_since(started) >= self.config.retry_timeout {
            BatchOutcome::TimedOut(failure)
        } else {
            BatchOutcome::Retrying(failure)
        }
    }
}

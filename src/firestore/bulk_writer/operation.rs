use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::channel::oneshot;

use crate::firestore::error::{internal_error, FirestoreError, FirestoreResult};
use crate::firestore::model::DocumentKey;
use crate::firestore::remote::{WriteOperation, WriteResult};

use super::MAX_RETRY_ATTEMPTS;

/// One pending write against one document.
///
/// Tracks how many attempts the write has consumed and when it next
/// becomes eligible for dispatch. The outcome is recorded exactly once;
/// the caller-facing [`PendingWrite`] future observes it when the
/// scheduler finishes the operation.
pub(crate) struct BulkWriterOperation {
    key: DocumentKey,
    write: WriteOperation,
    attempt_count: u32,
    next_attempt_time: Instant,
    backoff_unit: Duration,
    outcome: Option<FirestoreResult<WriteResult>>,
    sender: Option<oneshot::Sender<FirestoreResult<WriteResult>>>,
}

impl BulkWriterOperation {
    pub fn new(
        key: DocumentKey,
        write: WriteOperation,
        backoff_unit: Duration,
    ) -> (Self, PendingWrite) {
        let (sender, receiver) = oneshot::channel();
        let operation = Self {
            key,
            write,
            attempt_count: 0,
            next_attempt_time: Instant::now(),
            backoff_unit,
            outcome: None,
            sender: Some(sender),
        };
        (operation, PendingWrite { receiver })
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn write(&self) -> &WriteOperation {
        &self.write
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn next_attempt_time(&self) -> Instant {
        self.next_attempt_time
    }

    /// Whether the write has reached a final outcome (success or
    /// exhausted retries) and must not be dispatched again.
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    /// Records a successful write. Later calls are ignored; the first
    /// outcome wins.
    pub fn on_success(&mut self, result: WriteResult) {
        if self.outcome.is_none() {
            self.outcome = Some(Ok(result));
        }
    }

    /// Records a failed attempt. Once the retry budget is exhausted the
    /// operation resolves terminally with the final error; otherwise the
    /// next attempt is pushed out quadratically (`attempts²` backoff
    /// units) and the operation stays pending.
    pub fn on_failure(&mut self, error: FirestoreError) {
        if self.outcome.is_some() {
            return;
        }
        self.attempt_count += 1;
        if self.attempt_count >= MAX_RETRY_ATTEMPTS {
            self.outcome = Some(Err(error));
        } else {
            let backoff = self.backoff_unit * (self.attempt_count * self.attempt_count);
            self.next_attempt_time = Instant::now() + backoff;
        }
    }

    /// Delivers the recorded outcome to the caller's future. A no-op for
    /// operations that are still pending.
    pub fn finish(mut self) {
        if let (Some(outcome), Some(sender)) = (self.outcome.take(), self.sender.take()) {
            // The caller may have dropped its future; nothing to deliver then.
            let _ = sender.send(outcome);
        }
    }
}

/// Caller-facing handle resolving to the final result of one enqueued
/// write: the backend's acknowledgement on success, or the last error
/// once the retry budget is exhausted.
pub struct PendingWrite {
    receiver: oneshot::Receiver<FirestoreResult<WriteResult>>,
}

impl Future for PendingWrite {
    type Output = FirestoreResult<WriteResult>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(internal_error(
                "BulkWriter dropped the operation before resolving it",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_lock::Mutex;

use crate::firestore::error::{failed_precondition, FirestoreResult};
use crate::firestore::model::DocumentKey;
use crate::firestore::remote::{BatchWriteBackend, WriteOperation};
use crate::platform::runtime;

use super::commit_batch::CommitBatch;
use super::operation::{BulkWriterOperation, PendingWrite};
use super::rate_limiter::RateLimiter;
use super::{BulkWriterOptions, MAX_BATCH_SIZE};

/// How long the dispatch loop and the drain wait sleep between polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Retry-queue entry ordered by eligibility time, FIFO among ties.
struct RetryEntry {
    ready_at: Instant,
    seq: u64,
    operation: BulkWriterOperation,
}

impl PartialEq for RetryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for RetryEntry {}

impl PartialOrd for RetryEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RetryEntry {
    // Reversed so the std max-heap yields the earliest-eligible entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Everything the dispatch loop, enqueuers and batch completions share.
/// Held behind one lock because the invariants span all of it: batch
/// sizing reads the buffer and retry queue together, and resolving an
/// operation must release its document key in the same critical section
/// that delivers the result.
struct SchedulerState {
    buffer: VecDeque<BulkWriterOperation>,
    retries: BinaryHeap<RetryEntry>,
    pending_keys: HashSet<DocumentKey>,
    in_flight_batches: usize,
    outstanding: usize,
    accepting: bool,
    shut_down: bool,
    retry_seq: u64,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            retries: BinaryHeap::new(),
            pending_keys: HashSet::new(),
            in_flight_batches: 0,
            outstanding: 0,
            accepting: true,
            shut_down: false,
            retry_seq: 0,
        }
    }

    /// Moves every retry whose eligibility time has passed to the front
    /// of the dispatch buffer, ahead of never-attempted operations, in
    /// earliest-eligible-first order.
    fn promote_due_retries(&mut self, now: Instant) {
        let mut due = Vec::new();
        while let Some(entry) = self.retries.peek() {
            if entry.ready_at > now {
                break;
            }
            if let Some(entry) = self.retries.pop() {
                due.push(entry.operation);
            }
        }
        for operation in due.into_iter().rev() {
            self.buffer.push_front(operation);
        }
    }

    fn push_retry(&mut self, operation: BulkWriterOperation) {
        let entry = RetryEntry {
            ready_at: operation.next_attempt_time(),
            seq: self.retry_seq,
            operation,
        };
        self.retry_seq += 1;
        self.retries.push(entry);
    }
}

/// The concurrency core: owns the pending buffer, the retry queue and
/// the uniqueness set, and drives a background loop that forms batches
/// under the rate limiter and the in-flight budget.
pub(crate) struct Scheduler {
    backend: Arc<dyn BatchWriteBackend>,
    state: Arc<Mutex<SchedulerState>>,
    max_in_flight_batches: usize,
    backoff_unit: Duration,
}

impl Scheduler {
    /// Creates the scheduler and spawns its dispatch loop. The loop
    /// runs until `close` drains the writer.
    pub fn start(backend: Arc<dyn BatchWriteBackend>, options: &BulkWriterOptions) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            backend,
            state: Arc::new(Mutex::new(SchedulerState::new())),
            max_in_flight_batches: options.max_in_flight_batches.max(1),
            backoff_unit: options.retry_backoff_unit,
        });

        let dispatch = Arc::clone(&scheduler);
        runtime::spawn_detached(async move {
            dispatch.run().await;
        });

        scheduler
    }

    /// Registers a new write, enforcing the single-pending-write-per-
    /// document rule, and hands back the caller's completion future.
    pub async fn enqueue(
        &self,
        key: DocumentKey,
        write: WriteOperation,
    ) -> FirestoreResult<PendingWrite> {
        let mut state = self.state.lock().await;
        if state.shut_down || !state.accepting {
            return Err(failed_precondition(
                "BulkWriter is not accepting new writes (closed or mid-flush)",
            ));
        }
        if state.pending_keys.contains(&key) {
            return Err(failed_precondition(format!(
                "Document {} already has a pending write; await it or flush first",
                key.canonical_string()
            )));
        }

        let (operation, pending) = BulkWriterOperation::new(key.clone(), write, self.backoff_unit);
        state.pending_keys.insert(key);
        state.buffer.push_back(operation);
        state.outstanding += 1;
        Ok(pending)
    }

    /// Number of operations that have been enqueued but not resolved:
    /// buffered, queued for retry or in flight.
    pub async fn outstanding_operations(&self) -> usize {
        self.state.lock().await.outstanding
    }

    /// Drains every outstanding operation, then resumes accepting
    /// writes. New enqueues are rejected while the drain runs.
    pub async fn flush(&self) -> FirestoreResult<()> {
        {
            let mut state = self.state.lock().await;
            if state.shut_down {
                return Err(failed_precondition("BulkWriter has been closed"));
            }
            state.accepting = false;
        }

        self.wait_for_drain().await;

        let mut state = self.state.lock().await;
        if !state.shut_down {
            state.accepting = true;
        }
        Ok(())
    }

    /// Drains every outstanding operation and shuts the writer down for
    /// good. Idempotent.
    pub async fn close(&self) -> FirestoreResult<()> {
        {
            let mut state = self.state.lock().await;
            if state.shut_down {
                return Ok(());
            }
            state.accepting = false;
        }

        self.wait_for_drain().await;

        self.state.lock().await.shut_down = true;
        Ok(())
    }

    async fn wait_for_drain(&self) {
        loop {
            if self.state.lock().await.outstanding == 0 {
                return;
            }
            runtime::sleep(POLL_INTERVAL).await;
        }
    }

    /// The dispatch loop. Each turn promotes due retries, sizes a batch
    /// against the in-flight budget, pays for it at the rate limiter and
    /// hands it to a detached commit task. Nothing in the turn can fail;
    /// commit errors are contained inside the batch task.
    async fn run(self: Arc<Self>) {
        let mut limiter = RateLimiter::new();

        loop {
            let batch_size = {
                let mut state = self.state.lock().await;
                if state.shut_down && state.outstanding == 0 {
                    break;
                }
                state.promote_due_retries(Instant::now());
                if state.in_flight_batches >= self.max_in_flight_batches {
                    0
                } else {
                    state.buffer.len().min(MAX_BATCH_SIZE)
                }
            };

            if batch_size == 0 {
                runtime::sleep(POLL_INTERVAL).await;
                continue;
            }

            // Pay for the batch before taking it; the limiter sleeps the
            // loop, never a caller, and never while the lock is held.
            limiter.admit(batch_size).await;

            let batch = {
                let mut state = self.state.lock().await;
                let mut batch = CommitBatch::new(Arc::clone(&self.backend));
                while batch.len() < batch_size {
                    match state.buffer.pop_front() {
                        Some(operation) => batch.push(operation),
                        None => break,
                    }
                }
                if !batch.is_empty() {
                    state.in_flight_batches += 1;
                }
                batch
            };

            if batch.is_empty() {
                continue;
            }

            let completer = Arc::clone(&self);
            runtime::spawn_detached(async move {
                let operations = batch.commit().await;
                completer.complete_batch(operations).await;
            });
        }

        log::debug!("bulk writer dispatch loop exited after drain");
    }

    /// Demultiplexes a finished batch back into the shared state:
    /// resolved operations release their document key and deliver their
    /// outcome, unresolved ones re-enter the retry queue.
    async fn complete_batch(&self, operations: Vec<BulkWriterOperation>) {
        let mut state = self.state.lock().await;
        for operation in operations {
            if operation.is_resolved() {
                state.pending_keys.remove(operation.key());
                state.outstanding -= 1;
                operation.finish();
            } else {
                state.push_retry(operation);
            }
        }
        state.in_flight_batches -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ready_in: Duration, seq: u64) -> RetryEntry {
        let key = DocumentKey::from_string(format!("cities/{seq}").as_str()).unwrap();
        let write = crate::firestore::api::operations::create_write(
            key.clone(),
            std::collections::BTreeMap::new(),
        );
        let (operation, _pending) =
            BulkWriterOperation::new(key, write, Duration::from_secs(1));
        RetryEntry {
            ready_at: Instant::now() + ready_in,
            seq,
            operation,
        }
    }

    #[test]
    fn retry_heap_orders_by_time_then_fifo() {
        let base = Instant::now();
        let at = |offset: Duration, seq: u64| {
            let mut entry = entry(Duration::ZERO, seq);
            entry.ready_at = base + offset;
            entry
        };

        let mut heap = BinaryHeap::new();
        heap.push(at(Duration::from_secs(9), 0));
        heap.push(at(Duration::from_secs(1), 1));
        heap.push(at(Duration::from_secs(1), 2));

        let first = heap.pop().unwrap();
        let second = heap.pop().unwrap();
        let third = heap.pop().unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(third.seq, 0);
    }

    #[test]
    fn due_retries_are_promoted_ahead_of_fresh_operations() {
        let mut state = SchedulerState::new();

        let fresh = entry(Duration::ZERO, 10);
        state.buffer.push_back(fresh.operation);

        // Two already-due retries and one still in the future.
        let mut due_early = entry(Duration::ZERO, 0);
        due_early.ready_at = Instant::now() - Duration::from_secs(2);
        let mut due_late = entry(Duration::ZERO, 1);
        due_late.ready_at = Instant::now() - Duration::from_secs(1);
        let pending = entry(Duration::from_secs(60), 2);
        state.retries.push(due_late);
        state.retries.push(due_early);
        state.retries.push(pending);

        state.promote_due_retries(Instant::now());

        assert_eq!(state.buffer.len(), 3);
        assert_eq!(state.retries.len(), 1);
        // Earliest-eligible retry first, fresh operation last.
        assert_eq!(state.buffer[0].key().canonical_string(), "cities/0");
        assert_eq!(state.buffer[1].key().canonical_string(), "cities/1");
        assert_eq!(state.buffer[2].key().canonical_string(), "cities/10");
    }
}

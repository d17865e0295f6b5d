//! The dispatch engine — partitions a batch across a fixed worker pool,
//! one exclusively-owned SMTP session per worker, with per-message
//! failure isolation.

use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::message::RenderedMessage;
use crate::recipients::RecipientRecord;
use crate::session::{MailSession, SessionFactory};

/// Terminal status of one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Success,
    Failure,
}

/// The recorded result of one send attempt. Exactly one outcome exists
/// per message handed to the engine, success or not.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub recipient: RecipientRecord,
    pub status: SendStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SendOutcome {
    fn success(recipient: RecipientRecord) -> Self {
        Self {
            recipient,
            status: SendStatus::Success,
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn failure(recipient: RecipientRecord, reason: String) -> Self {
        Self {
            recipient,
            status: SendStatus::Failure,
            error: Some(reason),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SendStatus::Success
    }
}

/// Contiguous slice bounds for `len` items across `workers` workers.
///
/// Each worker gets a fixed stride of `len / workers` items; the last
/// worker's slice runs to the end of the batch, absorbing the remainder.
/// Empty slices are dropped, so at most `len` workers are ever used and
/// the returned slices are disjoint, contiguous, and cover the batch
/// exactly.
pub fn partition_bounds(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 || workers == 0 {
        return Vec::new();
    }

    let increment = len / workers;
    let mut bounds = Vec::with_capacity(workers);
    for worker in 0..workers {
        let start = worker * increment;
        let end = if worker == workers - 1 {
            len
        } else {
            start + increment
        };
        if end > start {
            bounds.push(start..end);
        }
    }
    bounds
}

/// Dispatches a batch of rendered messages across a fixed pool of
/// workers.
///
/// Partitions are static, assigned once at dispatch start; there is no
/// work stealing. Each worker opens its own session, drains its
/// partition strictly sequentially, and never shares the session.
/// `worker_count == 1` is the sequential case.
pub struct DispatchEngine<F: SessionFactory> {
    factory: Arc<F>,
    worker_count: usize,
}

impl<F: SessionFactory> DispatchEngine<F> {
    pub fn new(factory: F, worker_count: usize) -> Self {
        Self {
            factory: Arc::new(factory),
            worker_count: worker_count.max(1),
        }
    }

    /// Send the whole batch and block until every worker has finished.
    ///
    /// Returns exactly one outcome per input message. Outcomes keep each
    /// partition's original relative order and are merged in worker
    /// order.
    pub async fn dispatch(&self, batch: Vec<RenderedMessage>) -> Vec<SendOutcome> {
        let total = batch.len();
        let bounds = partition_bounds(total, self.worker_count);
        tracing::info!(
            messages = total,
            workers = bounds.len(),
            "dispatching batch"
        );

        let mut remaining = batch;
        let mut handles = Vec::with_capacity(bounds.len());
        for (worker, range) in bounds.into_iter().enumerate() {
            let partition: Vec<RenderedMessage> =
                remaining.drain(..range.end - range.start).collect();
            // Recipients are kept on this side of the task boundary so a
            // panicking worker still yields one outcome per message.
            let recipients: Vec<RecipientRecord> =
                partition.iter().map(|m| m.recipient.clone()).collect();
            let factory = Arc::clone(&self.factory);

            tracing::debug!(worker, start = range.start, end = range.end, "partition assigned");
            let handle =
                tokio::task::spawn_blocking(move || run_worker(worker, factory.as_ref(), partition));
            handles.push((handle, recipients));
        }

        let mut outcomes = Vec::with_capacity(total);
        for (handle, recipients) in handles {
            match handle.await {
                Ok(mut partition_outcomes) => outcomes.append(&mut partition_outcomes),
                Err(e) => {
                    tracing::error!(error = %e, "worker task aborted; failing its partition");
                    let reason = format!("worker aborted: {e}");
                    outcomes.extend(
                        recipients
                            .into_iter()
                            .map(|r| SendOutcome::failure(r, reason.clone())),
                    );
                }
            }
        }

        debug_assert_eq!(outcomes.len(), total);
        outcomes
    }
}

/// Drain one partition through one session, in order.
///
/// A send failure is recorded and the worker moves on to the next
/// message. A session-open failure fails the entire partition with a
/// distinguishing reason; other workers are unaffected.
fn run_worker<F: SessionFactory>(
    worker: usize,
    factory: &F,
    partition: Vec<RenderedMessage>,
) -> Vec<SendOutcome> {
    let mut session = match factory.open() {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(worker, error = %e, "session open failed; failing partition");
            let reason = format!("session unavailable: {e}");
            return partition
                .into_iter()
                .map(|m| SendOutcome::failure(m.recipient, reason.clone()))
                .collect();
        }
    };

    let mut outcomes = Vec::with_capacity(partition.len());
    for message in partition {
        match session.send(&message) {
            Ok(()) => {
                tracing::info!(
                    worker,
                    recipient = %message.recipient.email,
                    company = %message.recipient.company,
                    "message sent"
                );
                outcomes.push(SendOutcome::success(message.recipient));
            }
            Err(e) => {
                tracing::warn!(
                    worker,
                    recipient = %message.recipient.email,
                    error = %e,
                    "send failed; continuing with partition"
                );
                outcomes.push(SendOutcome::failure(message.recipient, e.to_string()));
            }
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Partition shape ─────────────────────────────────────────────

    #[test]
    fn remainder_goes_to_the_last_worker() {
        assert_eq!(partition_bounds(5, 2), vec![0..2, 2..5]);
    }

    #[test]
    fn even_split_has_no_remainder() {
        assert_eq!(partition_bounds(6, 3), vec![0..2, 2..4, 4..6]);
    }

    #[test]
    fn single_worker_takes_everything() {
        assert_eq!(partition_bounds(4, 1), vec![0..4]);
    }

    #[test]
    fn one_message_uses_one_worker() {
        assert_eq!(partition_bounds(1, 4), vec![0..1]);
    }

    #[test]
    fn fewer_messages_than_workers_collapses_to_one_partition() {
        // increment is 0, so every fixed-stride slice is empty and the
        // remainder-absorbing slice carries the whole batch
        assert_eq!(partition_bounds(3, 4), vec![0..3]);
    }

    #[test]
    fn empty_batch_has_no_partitions() {
        assert!(partition_bounds(0, 3).is_empty());
        assert!(partition_bounds(5, 0).is_empty());
    }

    #[test]
    fn partitions_cover_the_batch_exactly() {
        for len in 0..40 {
            for workers in 1..10 {
                let bounds = partition_bounds(len, workers);
                assert!(bounds.len() <= workers.min(len.max(1)));

                let mut covered = 0;
                let mut cursor = 0;
                for range in &bounds {
                    assert_eq!(range.start, cursor, "len={len} workers={workers}");
                    assert!(range.end > range.start, "empty slice dispatched");
                    covered += range.end - range.start;
                    cursor = range.end;
                }
                assert_eq!(covered, len, "len={len} workers={workers}");
            }
        }
    }

    // ── Outcomes ────────────────────────────────────────────────────

    #[test]
    fn outcome_constructors_set_status() {
        let recipient = crate::recipients::RecipientRecord {
            first_name: "Ada".to_string(),
            display_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            company: "Analytical Engines".to_string(),
        };
        let ok = SendOutcome::success(recipient.clone());
        assert!(ok.is_success());
        assert!(ok.error.is_none());

        let failed = SendOutcome::failure(recipient, "550 mailbox unavailable".to_string());
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("550 mailbox unavailable"));
    }
}

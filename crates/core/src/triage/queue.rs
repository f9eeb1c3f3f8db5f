//! The triage job queue handle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics;

use super::{JobHandle, TriageError, TriageJob};

/// Handle for submitting triage jobs.
///
/// Cheaply cloneable; the receiving end lives in the TriageRunner. The
/// channel is bounded: a full or closed channel surfaces QueueUnavailable to
/// the caller instead of blocking or silently dropping work.
#[derive(Clone)]
pub struct TriageQueue {
    tx: mpsc::Sender<TriageJob>,
    depth: Arc<AtomicUsize>,
}

impl TriageQueue {
    pub(super) fn new(tx: mpsc::Sender<TriageJob>, depth: Arc<AtomicUsize>) -> Self {
        Self { tx, depth }
    }

    /// Enqueue a triage job for a ticket.
    pub fn enqueue(
        &self,
        ticket_id: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Result<JobHandle, TriageError> {
        let job = TriageJob {
            ticket_id: ticket_id.into(),
            trace_id: trace_id.into(),
            attempt: 1,
        };
        let handle = JobHandle {
            ticket_id: job.ticket_id.clone(),
            trace_id: job.trace_id.clone(),
        };

        // Count the job before sending: the dispatcher decrements on
        // receive, which can happen before try_send even returns.
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(e) = self.tx.try_send(job) {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            debug!("Triage queue rejected job: {}", e);
            return Err(TriageError::QueueUnavailable);
        }

        metrics::QUEUE_DEPTH.set(depth as i64);
        debug!(ticket_id = %handle.ticket_id, trace_id = %handle.trace_id, "Queued triage job");

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_returns_handle() {
        let (tx, mut rx) = mpsc::channel(4);
        let queue = TriageQueue::new(tx, Arc::new(AtomicUsize::new(0)));

        let handle = queue.enqueue("t-1", "trace-1").unwrap();
        assert_eq!(handle.ticket_id, "t-1");
        assert_eq!(handle.trace_id, "trace-1");

        let job = rx.try_recv().unwrap();
        assert_eq!(job.ticket_id, "t-1");
        assert_eq!(job.attempt, 1);
    }

    #[test]
    fn test_enqueue_full_channel_is_unavailable() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = TriageQueue::new(tx, Arc::new(AtomicUsize::new(0)));

        queue.enqueue("t-1", "trace-1").unwrap();
        let err = queue.enqueue("t-2", "trace-2").unwrap_err();
        assert!(matches!(err, TriageError::QueueUnavailable));
    }

    #[test]
    fn test_enqueue_closed_channel_is_unavailable() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let queue = TriageQueue::new(tx, Arc::new(AtomicUsize::new(0)));

        let err = queue.enqueue("t-1", "trace-1").unwrap_err();
        assert!(matches!(err, TriageError::QueueUnavailable));
    }
}

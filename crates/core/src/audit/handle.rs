use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::{AuditActor, AuditEvent};

/// Envelope wrapping an audit event with metadata.
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    /// Trace id linking the entries of one triage attempt, if any.
    pub trace_id: Option<String>,
    pub actor: AuditActor,
    pub event: AuditEvent,
}

/// Handle for emitting audit events.
///
/// Cheaply cloneable; share it across tasks. Events are sent through an async
/// channel and written by the AuditWriter. Emitting is best-effort: a full or
/// closed channel is logged, never surfaced to the caller. An audit outage
/// must not abort the triage pipeline.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    /// Create a new audit handle from a channel sender.
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an audit event asynchronously.
    pub async fn emit(&self, actor: AuditActor, trace_id: Option<&str>, event: AuditEvent) {
        let envelope = AuditEventEnvelope {
            timestamp: Utc::now(),
            trace_id: trace_id.map(String::from),
            actor,
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit audit event: {}", e);
        }
    }

    /// Try to emit an audit event without blocking.
    ///
    /// Returns true if the event was sent successfully, false otherwise.
    pub fn try_emit(&self, actor: AuditActor, trace_id: Option<&str>, event: AuditEvent) -> bool {
        let envelope = AuditEventEnvelope {
            timestamp: Utc::now(),
            trace_id: trace_id.map(String::from),
            actor,
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit audit event: {}", e);
                false
            }
        }
    }
}

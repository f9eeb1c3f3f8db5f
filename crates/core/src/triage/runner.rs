//! Triage runner: bounded worker pool draining the triage queue.
//!
//! One job = one triage attempt for one ticket: classify, persist the
//! suggestion, transition the ticket, decide, act. Jobs for different
//! tickets run concurrently with no ordering guarantee; jobs for the same
//! ticket are single-flight.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditActor, AuditEvent, AuditHandle};
use crate::classifier::{ClassificationRequest, Classifier};
use crate::decision::{decide, TriageDecision};
use crate::metrics;
use crate::policy::PolicyStore;
use crate::suggestion::{NewSuggestion, SuggestionStore};
use crate::ticket::{Reply, TicketError, TicketStatus, TicketStore};

use super::config::TriageConfig;
use super::queue::TriageQueue;
use super::retry::RetryPolicy;
use super::types::{FinishedJob, JobOutcome, TriageError, TriageJob, TriageStatus};

/// Everything a worker task needs, shared behind one Arc.
struct Shared {
    config: TriageConfig,
    ticket_store: Arc<dyn TicketStore>,
    suggestion_store: Arc<dyn SuggestionStore>,
    policy_store: Arc<dyn PolicyStore>,
    classifier: Arc<dyn Classifier>,
    audit: Option<AuditHandle>,
    tx: mpsc::Sender<TriageJob>,
    depth: Arc<AtomicUsize>,
    /// Tickets with a triage currently in flight (single-flight key).
    in_flight: Mutex<HashSet<String>>,
    /// Bounded recent history, newest first.
    completed: Mutex<VecDeque<FinishedJob>>,
    failed: Mutex<VecDeque<FinishedJob>>,
}

/// The triage runner: owns the queue receiver and the worker pool.
pub struct TriageRunner {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    rx: std::sync::Mutex<Option<mpsc::Receiver<TriageJob>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TriageRunner {
    /// Create a new runner. Call `start` to begin processing.
    pub fn new(
        config: TriageConfig,
        ticket_store: Arc<dyn TicketStore>,
        suggestion_store: Arc<dyn SuggestionStore>,
        policy_store: Arc<dyn PolicyStore>,
        classifier: Arc<dyn Classifier>,
        audit: Option<AuditHandle>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);
        let depth = Arc::new(AtomicUsize::new(0));

        let shared = Arc::new(Shared {
            config,
            ticket_store,
            suggestion_store,
            policy_store,
            classifier,
            audit,
            tx,
            depth,
            in_flight: Mutex::new(HashSet::new()),
            completed: Mutex::new(VecDeque::new()),
            failed: Mutex::new(VecDeque::new()),
        });

        Self {
            shared,
            running: Arc::new(AtomicBool::new(false)),
            rx: std::sync::Mutex::new(Some(rx)),
            shutdown_tx,
        }
    }

    /// Queue handle for submitting jobs. Clone freely.
    pub fn queue(&self) -> TriageQueue {
        TriageQueue::new(self.shared.tx.clone(), Arc::clone(&self.shared.depth))
    }

    /// Start the dispatcher and worker pool.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Triage runner already running");
            return;
        }

        let Some(mut rx) = self.rx.lock().unwrap().take() else {
            warn!("Triage runner was already started once");
            return;
        };

        info!(workers = self.shared.config.workers, "Starting triage runner");

        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let semaphore = Arc::new(Semaphore::new(self.shared.config.workers));

        tokio::spawn(async move {
            info!("Triage dispatcher started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Triage dispatcher received shutdown signal");
                        break;
                    }
                    job = rx.recv() => {
                        let Some(job) = job else { break };

                        let depth = shared.depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
                        metrics::QUEUE_DEPTH.set(depth as i64);

                        if !running.load(Ordering::Relaxed) {
                            break;
                        }

                        // Single-flight: a second job for a ticket whose
                        // triage is still in flight is deferred, not run.
                        {
                            let mut in_flight = shared.in_flight.lock().await;
                            if in_flight.contains(&job.ticket_id) {
                                drop(in_flight);
                                debug!(
                                    ticket_id = %job.ticket_id,
                                    "Triage already in flight, deferring job"
                                );
                                let delay = Duration::from_millis(
                                    shared.config.singleflight_requeue_delay_ms,
                                );
                                Self::requeue_later(&shared, job, delay);
                                continue;
                            }
                            in_flight.insert(job.ticket_id.clone());
                        }

                        let Ok(permit) = semaphore.clone().acquire_owned().await else {
                            break;
                        };

                        let worker_shared = Arc::clone(&shared);
                        tokio::spawn(async move {
                            let _permit = permit;
                            Self::run_job(&worker_shared, job).await;
                        });
                    }
                }
            }
            info!("Triage dispatcher stopped");
        });
    }

    /// Stop the runner gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Triage runner not running");
            return;
        }

        info!("Stopping triage runner");
        let _ = self.shutdown_tx.send(());

        // Give in-flight workers a moment to finish.
        tokio::time::sleep(Duration::from_millis(200)).await;

        info!("Triage runner stopped");
    }

    /// Snapshot of the runner's current state.
    pub async fn status(&self) -> TriageStatus {
        let in_flight = self.shared.in_flight.lock().await.len();
        let completed = self.shared.completed.lock().await;
        let failed = self.shared.failed.lock().await;

        TriageStatus {
            running: self.running.load(Ordering::Relaxed),
            workers: self.shared.config.workers,
            in_flight,
            queued: self.shared.depth.load(Ordering::Relaxed),
            recent_completed: completed.iter().cloned().collect(),
            recent_failed: failed.iter().cloned().collect(),
        }
    }

    /// Run one job to completion, then release its single-flight slot.
    async fn run_job(shared: &Arc<Shared>, job: TriageJob) {
        let started = Instant::now();
        let result = Self::process_job(shared, &job).await;

        // Release the slot before any backoff re-delivery is scheduled so
        // the retry itself is not deferred by its own ticket.
        shared.in_flight.lock().await.remove(&job.ticket_id);

        match result {
            Ok(outcome) => {
                let label = match &outcome {
                    JobOutcome::AutoClosed { .. } => "auto_closed",
                    JobOutcome::AssignedToHuman { .. } => "assigned_to_human",
                    JobOutcome::Failed { .. } => "failed",
                };
                metrics::TRIAGE_JOBS.with_label_values(&[label]).inc();
                metrics::TRIAGE_JOB_DURATION
                    .with_label_values(&[label])
                    .observe(started.elapsed().as_secs_f64());

                let finished = FinishedJob {
                    ticket_id: job.ticket_id.clone(),
                    trace_id: job.trace_id.clone(),
                    attempt: job.attempt,
                    outcome,
                    finished_at: Utc::now(),
                };
                let mut completed = shared.completed.lock().await;
                completed.push_front(finished);
                completed.truncate(shared.config.completed_history);
            }
            Err(e) => Self::handle_failure(shared, job, e, started).await,
        }
    }

    /// The per-job triage pipeline.
    async fn process_job(
        shared: &Arc<Shared>,
        job: &TriageJob,
    ) -> Result<JobOutcome, TriageError> {
        let ticket = shared
            .ticket_store
            .get(&job.ticket_id)?
            .ok_or_else(|| TriageError::TicketNotFound(job.ticket_id.clone()))?;

        // Resolved/closed tickets are off limits; fail before touching
        // anything.
        if !ticket.status.can_triage() {
            return Err(TriageError::Ticket(TicketError::InvalidTransition {
                ticket_id: ticket.id.clone(),
                from: ticket.status,
                to: TicketStatus::Triaged,
            }));
        }

        debug!(ticket_id = %ticket.id, trace_id = %job.trace_id, attempt = job.attempt, "Processing triage job");

        Self::audit(
            shared,
            &job.trace_id,
            AuditActor::System,
            AuditEvent::TriageStarted {
                ticket_id: ticket.id.clone(),
                attempt: job.attempt,
            },
        )
        .await;

        // Loaded fresh per job: an operator change applies to the very next
        // decision.
        let policy = shared.policy_store.get()?;

        let request = ClassificationRequest {
            ticket_id: ticket.id.clone(),
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            category: ticket.category,
            trace_id: job.trace_id.clone(),
        };

        let classify_started = Instant::now();
        let result = match shared.classifier.classify(&request).await {
            Ok(result) => {
                metrics::CLASSIFICATION_REQUESTS
                    .with_label_values(&["success"])
                    .inc();
                metrics::CLASSIFICATION_DURATION
                    .with_label_values(&["success"])
                    .observe(classify_started.elapsed().as_secs_f64());
                result
            }
            Err(e) => {
                metrics::CLASSIFICATION_REQUESTS
                    .with_label_values(&["error"])
                    .inc();
                metrics::CLASSIFICATION_DURATION
                    .with_label_values(&["error"])
                    .observe(classify_started.elapsed().as_secs_f64());
                return Err(e.into());
            }
        };

        metrics::CONFIDENCE.observe(result.confidence as f64);

        Self::audit(
            shared,
            &job.trace_id,
            AuditActor::System,
            AuditEvent::CategoryClassified {
                ticket_id: ticket.id.clone(),
                predicted_category: result.predicted_category,
                confidence: result.confidence,
                provider: result.model_info.provider.clone(),
                model: result.model_info.model.clone(),
            },
        )
        .await;

        Self::audit(
            shared,
            &job.trace_id,
            AuditActor::System,
            AuditEvent::ArticlesRetrieved {
                ticket_id: ticket.id.clone(),
                article_ids: result.article_ids.clone(),
            },
        )
        .await;

        Self::audit(
            shared,
            &job.trace_id,
            AuditActor::System,
            AuditEvent::DraftGenerated {
                ticket_id: ticket.id.clone(),
                draft_chars: result.draft_reply.chars().count(),
            },
        )
        .await;

        let suggestion = shared.suggestion_store.insert(NewSuggestion {
            ticket_id: ticket.id.clone(),
            predicted_category: result.predicted_category,
            article_ids: result.article_ids.clone(),
            draft_reply: result.draft_reply.clone(),
            confidence: result.confidence,
            model_info: result.model_info.clone(),
        })?;

        let prior_status = ticket.status;
        shared.ticket_store.mark_triaged(&ticket.id, &suggestion.id)?;

        Self::audit(
            shared,
            &job.trace_id,
            AuditActor::System,
            AuditEvent::StatusChanged {
                ticket_id: ticket.id.clone(),
                from_status: prior_status,
                to_status: TicketStatus::Triaged,
                reason: Some("classification recorded".to_string()),
            },
        )
        .await;

        match decide(&result, &policy) {
            TriageDecision::AutoClose {
                confidence,
                threshold,
            } => {
                shared.ticket_store.append_reply(
                    &ticket.id,
                    Reply::from_agent(result.draft_reply.clone()),
                    Some(TicketStatus::Resolved),
                )?;
                shared.suggestion_store.mark_auto_closed(&suggestion.id)?;

                Self::audit(
                    shared,
                    &job.trace_id,
                    AuditActor::Agent,
                    AuditEvent::ReplySent {
                        ticket_id: ticket.id.clone(),
                        author: None,
                        is_agent: true,
                    },
                )
                .await;
                Self::audit(
                    shared,
                    &job.trace_id,
                    AuditActor::System,
                    AuditEvent::StatusChanged {
                        ticket_id: ticket.id.clone(),
                        from_status: TicketStatus::Triaged,
                        to_status: TicketStatus::Resolved,
                        reason: Some(format!("auto-closed at confidence {:.2}", confidence)),
                    },
                )
                .await;
                Self::audit(
                    shared,
                    &job.trace_id,
                    AuditActor::System,
                    AuditEvent::AutoClosed {
                        ticket_id: ticket.id.clone(),
                        suggestion_id: suggestion.id.clone(),
                        confidence,
                        threshold,
                    },
                )
                .await;

                info!(
                    ticket_id = %ticket.id,
                    confidence,
                    threshold,
                    "Ticket auto-closed"
                );

                Ok(JobOutcome::AutoClosed {
                    suggestion_id: suggestion.id,
                    confidence,
                })
            }
            TriageDecision::AssignToHuman {
                confidence,
                threshold,
                reason,
            } => {
                shared
                    .ticket_store
                    .update_status(&ticket.id, TicketStatus::WaitingHuman)?;

                Self::audit(
                    shared,
                    &job.trace_id,
                    AuditActor::System,
                    AuditEvent::StatusChanged {
                        ticket_id: ticket.id.clone(),
                        from_status: TicketStatus::Triaged,
                        to_status: TicketStatus::WaitingHuman,
                        reason: Some(reason.as_str().to_string()),
                    },
                )
                .await;
                Self::audit(
                    shared,
                    &job.trace_id,
                    AuditActor::System,
                    AuditEvent::AssignedToHuman {
                        ticket_id: ticket.id.clone(),
                        confidence,
                        threshold,
                        reason: reason.as_str().to_string(),
                    },
                )
                .await;

                info!(
                    ticket_id = %ticket.id,
                    confidence,
                    threshold,
                    reason = reason.as_str(),
                    "Ticket assigned to human"
                );

                Ok(JobOutcome::AssignedToHuman {
                    suggestion_id: suggestion.id,
                    confidence,
                    reason: reason.as_str().to_string(),
                })
            }
        }
    }

    /// Retry with backoff, or fence the ticket and record the failure.
    async fn handle_failure(
        shared: &Arc<Shared>,
        job: TriageJob,
        error: TriageError,
        started: Instant,
    ) {
        let retryable = error.is_retryable();

        // The retry budget is policy, read at failure time; the config value
        // only covers a policy store outage.
        let max_attempts = shared
            .policy_store
            .get()
            .map(|p| p.max_retries)
            .unwrap_or(shared.config.max_retries);
        let retry_policy = RetryPolicy::new(
            max_attempts,
            Duration::from_millis(shared.config.retry_base_delay_ms),
        );

        if retryable && retry_policy.should_retry(job.attempt) {
            let delay = retry_policy.delay_for(job.attempt);
            warn!(
                ticket_id = %job.ticket_id,
                attempt = job.attempt,
                delay_ms = delay.as_millis() as u64,
                "Triage attempt failed, retrying: {}",
                error
            );
            metrics::TRIAGE_RETRIES.inc();

            let next = TriageJob {
                attempt: job.attempt + 1,
                ..job
            };
            Self::requeue_later(shared, next, delay);
            return;
        }

        error!(
            ticket_id = %job.ticket_id,
            attempts = job.attempt,
            retryable,
            "Triage failed permanently: {}",
            error
        );

        // Budget exhausted: fence the ticket into a human-actionable state.
        // Non-retryable failures leave the ticket untouched.
        if retryable {
            match shared.ticket_store.get(&job.ticket_id) {
                Ok(Some(ticket))
                    if ticket.status != TicketStatus::WaitingHuman
                        && TicketStatus::can_transition(
                            ticket.status,
                            TicketStatus::WaitingHuman,
                        ) =>
                {
                    match shared
                        .ticket_store
                        .update_status(&job.ticket_id, TicketStatus::WaitingHuman)
                    {
                        Ok(_) => {
                            Self::audit(
                                shared,
                                &job.trace_id,
                                AuditActor::System,
                                AuditEvent::StatusChanged {
                                    ticket_id: job.ticket_id.clone(),
                                    from_status: ticket.status,
                                    to_status: TicketStatus::WaitingHuman,
                                    reason: Some("triage retry budget exhausted".to_string()),
                                },
                            )
                            .await;
                        }
                        Err(e) => {
                            warn!(
                                ticket_id = %job.ticket_id,
                                "Failed to fence ticket after triage failure: {}",
                                e
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        ticket_id = %job.ticket_id,
                        "Failed to load ticket while fencing: {}",
                        e
                    );
                }
            }
        }

        Self::audit(
            shared,
            &job.trace_id,
            AuditActor::System,
            AuditEvent::TriageFailed {
                ticket_id: job.ticket_id.clone(),
                error: error.to_string(),
                attempts: job.attempt,
            },
        )
        .await;

        metrics::TRIAGE_JOBS.with_label_values(&["failed"]).inc();
        metrics::TRIAGE_JOB_DURATION
            .with_label_values(&["failed"])
            .observe(started.elapsed().as_secs_f64());

        let finished = FinishedJob {
            ticket_id: job.ticket_id.clone(),
            trace_id: job.trace_id.clone(),
            attempt: job.attempt,
            outcome: JobOutcome::Failed {
                error: error.to_string(),
                attempts: job.attempt,
            },
            finished_at: Utc::now(),
        };
        let mut failed = shared.failed.lock().await;
        failed.push_front(finished);
        failed.truncate(shared.config.failed_history);
    }

    /// Put a job back on the queue after a delay.
    fn requeue_later(shared: &Arc<Shared>, job: TriageJob, delay: Duration) {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let ticket_id = job.ticket_id.clone();
            // Count before sending; the dispatcher decrements on receive.
            let depth = shared.depth.fetch_add(1, Ordering::Relaxed) + 1;
            metrics::QUEUE_DEPTH.set(depth as i64);
            if shared.tx.send(job).await.is_err() {
                shared.depth.fetch_sub(1, Ordering::Relaxed);
                warn!(ticket_id = %ticket_id, "Dropping triage job: queue closed");
            }
        });
    }

    async fn audit(shared: &Arc<Shared>, trace_id: &str, actor: AuditActor, event: AuditEvent) {
        if let Some(ref handle) = shared.audit {
            handle.emit(actor, Some(trace_id), event).await;
        }
    }
}

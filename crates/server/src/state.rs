use std::sync::Arc;

use triage_core::{
    AuditHandle, AuditStore, Config, PolicyStore, SuggestionStore, TicketStore, TriageQueue,
    TriageRunner,
};

/// Shared application state
pub struct AppState {
    config: Config,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
    ticket_store: Arc<dyn TicketStore>,
    suggestion_store: Arc<dyn SuggestionStore>,
    policy_store: Arc<dyn PolicyStore>,
    runner: Arc<TriageRunner>,
    queue: TriageQueue,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        ticket_store: Arc<dyn TicketStore>,
        suggestion_store: Arc<dyn SuggestionStore>,
        policy_store: Arc<dyn PolicyStore>,
        runner: Arc<TriageRunner>,
    ) -> Self {
        let queue = runner.queue();
        Self {
            config,
            audit,
            audit_store,
            ticket_store,
            suggestion_store,
            policy_store,
            runner,
            queue,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn ticket_store(&self) -> &dyn TicketStore {
        self.ticket_store.as_ref()
    }

    pub fn suggestion_store(&self) -> &dyn SuggestionStore {
        self.suggestion_store.as_ref()
    }

    pub fn policy_store(&self) -> &dyn PolicyStore {
        self.policy_store.as_ref()
    }

    pub fn runner(&self) -> &TriageRunner {
        self.runner.as_ref()
    }

    pub fn queue(&self) -> &TriageQueue {
        &self.queue
    }
}

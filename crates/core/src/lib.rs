//! Core of the ticket triage service: data model, state machine, stores,
//! classification client, decision engine, triage queue and audit trail.

pub mod audit;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod metrics;
pub mod policy;
pub mod suggestion;
pub mod testing;
pub mod ticket;
pub mod triage;

pub use audit::{
    create_audit_system, AuditActor, AuditError, AuditEvent, AuditFilter, AuditHandle,
    AuditRecord, AuditStore, AuditWriter, SqliteAuditStore,
};
pub use classifier::{
    ClassificationRequest, ClassificationResult, Classifier, ClassifierError, HttpClassifier,
};
pub use config::{
    load_config, load_config_from_str, validate_config, ClassifierConfig, Config, ConfigError,
    DatabaseConfig, ServerConfig,
};
pub use decision::{decide, AssignReason, TriageDecision};
pub use policy::{PolicyError, PolicyStore, PolicyUpdate, SqlitePolicyStore, TriagePolicy};
pub use suggestion::{
    AgentSuggestion, ModelInfo, NewSuggestion, SqliteSuggestionStore, SuggestionError,
    SuggestionStore,
};
pub use ticket::{
    CreateTicketRequest, Reply, SqliteTicketStore, Ticket, TicketCategory, TicketError,
    TicketFilter, TicketPriority, TicketStatus, TicketStore,
};
pub use triage::{
    FinishedJob, JobHandle, JobOutcome, RetryPolicy, TriageConfig, TriageError, TriageJob,
    TriageQueue, TriageRunner, TriageStatus,
};

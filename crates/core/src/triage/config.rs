//! Triage queue configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the triage queue and worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Number of parallel workers pulling jobs from the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the job channel. Enqueueing into a full channel fails
    /// with QueueUnavailable rather than blocking the caller.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Base delay for exponential backoff between delivery attempts
    /// (milliseconds). Doubles per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Fallback retry budget, used only when the policy store cannot be
    /// read at failure time. The live budget comes from the policy.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long to wait before re-offering a job whose ticket already has a
    /// triage in flight (milliseconds). Does not consume an attempt.
    #[serde(default = "default_singleflight_delay_ms")]
    pub singleflight_requeue_delay_ms: u64,

    /// How many recently completed jobs to keep for observability.
    #[serde(default = "default_completed_history")]
    pub completed_history: usize,

    /// How many recently failed jobs to keep for observability.
    #[serde(default = "default_failed_history")]
    pub failed_history: usize,
}

fn default_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    256
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_singleflight_delay_ms() -> u64 {
    250
}

fn default_completed_history() -> usize {
    10
}

fn default_failed_history() -> usize {
    5
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_retries: default_max_retries(),
            singleflight_requeue_delay_ms: default_singleflight_delay_ms(),
            completed_history: default_completed_history(),
            failed_history: default_failed_history(),
        }
    }
}

//! Policy storage trait.

use thiserror::Error;

use super::{PolicyUpdate, TriagePolicy};

/// Error type for policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy update: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Trait for policy storage backends.
///
/// The policy is a singleton: `get` creates it with defaults if absent.
/// Reads may happen concurrently from every worker; updates come from a
/// single operator path and are serialized by the implementation.
pub trait PolicyStore: Send + Sync {
    /// Read the current policy, creating the default one if none exists.
    fn get(&self) -> Result<TriagePolicy, PolicyError>;

    /// Apply a partial update and return the new policy.
    fn update(&self, update: PolicyUpdate) -> Result<TriagePolicy, PolicyError>;
}

//! Classification service abstraction.
//!
//! The classifier is an opaque remote service; this module owns the wire
//! contract and the timeout, nothing else. Retry policy lives in the triage
//! queue.

mod http;
mod types;

pub use http::HttpClassifier;
pub use types::{ClassificationRequest, ClassificationResult, ClassifierError};

use async_trait::async_trait;

/// Trait for classification backends.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a ticket, returning the predicted category, confidence,
    /// supporting articles and a draft reply.
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResult, ClassifierError>;
}

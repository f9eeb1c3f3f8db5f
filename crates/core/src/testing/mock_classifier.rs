//! Mock classifier for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::classifier::{
    ClassificationRequest, ClassificationResult, Classifier, ClassifierError,
};

/// Mock implementation of the Classifier trait.
///
/// Provides controllable behavior for testing:
/// - Return a configurable result (or a queue of one-shot results)
/// - Script error sequences (e.g. three timeouts in a row)
/// - Record requests for assertions
pub struct MockClassifier {
    /// Default result returned when the one-shot queue is empty.
    default_result: Arc<RwLock<Option<ClassificationResult>>>,
    /// One-shot results, consumed in order before the default.
    queued_results: Arc<RwLock<VecDeque<ClassificationResult>>>,
    /// Scripted errors, consumed before any result.
    queued_errors: Arc<RwLock<VecDeque<ClassifierError>>>,
    /// Recorded classification requests.
    requests: Arc<RwLock<Vec<ClassificationRequest>>>,
    /// Artificial latency applied to every call.
    delay: Arc<RwLock<Option<std::time::Duration>>>,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    /// Create a new mock with no configured behavior. Calls fail with an API
    /// error until a result is set.
    pub fn new() -> Self {
        Self {
            default_result: Arc::new(RwLock::new(None)),
            queued_results: Arc::new(RwLock::new(VecDeque::new())),
            queued_errors: Arc::new(RwLock::new(VecDeque::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Add artificial latency to every classify call.
    pub async fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Set the result returned by every subsequent call.
    pub async fn set_result(&self, result: ClassificationResult) {
        *self.default_result.write().await = Some(result);
    }

    /// Queue a one-shot result, consumed before the default result.
    pub async fn push_result(&self, result: ClassificationResult) {
        self.queued_results.write().await.push_back(result);
    }

    /// Queue a one-shot error, consumed before any result.
    pub async fn push_error(&self, error: ClassifierError) {
        self.queued_errors.write().await.push_back(error);
    }

    /// Queue `n` consecutive timeout errors.
    pub async fn fail_with_timeouts(&self, n: usize) {
        let mut errors = self.queued_errors.write().await;
        for _ in 0..n {
            errors.push_back(ClassifierError::Timeout(std::time::Duration::from_secs(30)));
        }
    }

    /// Get recorded classification requests.
    pub async fn recorded_requests(&self) -> Vec<ClassificationRequest> {
        self.requests.read().await.clone()
    }

    /// Number of classify calls made.
    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResult, ClassifierError> {
        self.requests.write().await.push(request.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.queued_errors.write().await.pop_front() {
            return Err(error);
        }

        if let Some(result) = self.queued_results.write().await.pop_front() {
            return Ok(result);
        }

        match self.default_result.read().await.clone() {
            Some(result) => Ok(result),
            None => Err(ClassifierError::Api {
                status: 500,
                message: "mock classifier has no configured result".to_string(),
            }),
        }
    }
}

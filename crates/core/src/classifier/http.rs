//! HTTP classification service client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::suggestion::ModelInfo;
use crate::ticket::TicketCategory;

use super::{ClassificationRequest, ClassificationResult, Classifier, ClassifierError};

/// Client for the external classification service.
///
/// One bounded-timeout POST per call; retry and backoff belong to the triage
/// queue, never to this client.
pub struct HttpClassifier {
    client: Client,
    config: ClassifierConfig,
    timeout: Duration,
}

impl HttpClassifier {
    /// Create a new client from configuration.
    pub fn new(config: ClassifierConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs as u64);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            timeout,
        }
    }

    fn triage_url(&self) -> String {
        format!("{}/triage", self.config.url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct TriageWireRequest<'a> {
    ticket: TriageWireTicket<'a>,
    trace_id: &'a str,
}

#[derive(Debug, Serialize)]
struct TriageWireTicket<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    category: TicketCategory,
}

#[derive(Debug, Deserialize)]
struct TriageWireResponse {
    suggestion: TriageWireSuggestion,
    processing_time_ms: u64,
}

#[derive(Debug, Deserialize)]
struct TriageWireSuggestion {
    predicted_category: TicketCategory,
    confidence: f32,
    #[serde(default)]
    article_ids: Vec<String>,
    draft_reply: String,
    model_info: TriageWireModelInfo,
}

#[derive(Debug, Deserialize)]
struct TriageWireModelInfo {
    provider: String,
    model: String,
    prompt_version: String,
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResult, ClassifierError> {
        let wire_request = TriageWireRequest {
            ticket: TriageWireTicket {
                id: &request.ticket_id,
                title: &request.title,
                description: &request.description,
                category: request.category,
            },
            trace_id: &request.trace_id,
        };

        debug!(ticket_id = %request.ticket_id, trace_id = %request.trace_id, "Requesting classification");
        let started = Instant::now();

        let response = self
            .client
            .post(self.triage_url())
            .header("X-Trace-ID", &request.trace_id)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(self.timeout)
                } else {
                    ClassifierError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let wire: TriageWireResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Json(e.to_string()))?;

        debug!(
            ticket_id = %request.ticket_id,
            predicted = %wire.suggestion.predicted_category,
            confidence = wire.suggestion.confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Classification complete"
        );

        Ok(ClassificationResult {
            predicted_category: wire.suggestion.predicted_category,
            confidence: wire.suggestion.confidence,
            article_ids: wire.suggestion.article_ids,
            draft_reply: wire.suggestion.draft_reply,
            model_info: ModelInfo {
                provider: wire.suggestion.model_info.provider,
                model: wire.suggestion.model_info.model,
                prompt_version: wire.suggestion.model_info.prompt_version,
                latency_ms: Some(wire.processing_time_ms),
            },
            processing_time_ms: wire.processing_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triage_url_strips_trailing_slash() {
        let classifier = HttpClassifier::new(ClassifierConfig {
            url: "http://localhost:8000/".to_string(),
            timeout_secs: 30,
        });
        assert_eq!(classifier.triage_url(), "http://localhost:8000/triage");
    }

    #[test]
    fn test_wire_response_parsing() {
        let json = r#"{
            "suggestion": {
                "predicted_category": "shipping",
                "confidence": 0.81,
                "article_ids": ["a-1"],
                "draft_reply": "Your package is on the way.",
                "model_info": {
                    "provider": "gemini",
                    "model": "gemini-pro",
                    "prompt_version": "v1.0"
                }
            },
            "processing_time_ms": 933
        }"#;

        let wire: TriageWireResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            wire.suggestion.predicted_category,
            TicketCategory::Shipping
        );
        assert_eq!(wire.processing_time_ms, 933);
    }
}

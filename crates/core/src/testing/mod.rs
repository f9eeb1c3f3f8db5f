//! Test doubles and fixtures for the triage pipeline.
//!
//! Only compiled into consumers' test builds by convention; the mocks are
//! regular types so integration tests and downstream crates can use them.

mod mock_classifier;

pub use mock_classifier::MockClassifier;

/// Canned test data builders.
pub mod fixtures {
    use crate::classifier::ClassificationResult;
    use crate::suggestion::ModelInfo;
    use crate::ticket::{CreateTicketRequest, TicketCategory, TicketPriority};

    /// A classification result with the given category and confidence.
    pub fn classification(category: TicketCategory, confidence: f32) -> ClassificationResult {
        ClassificationResult {
            predicted_category: category,
            confidence,
            article_ids: vec!["kb-101".to_string()],
            draft_reply: format!(
                "Thanks for reaching out. This looks like a {} issue; here is what to do.",
                category
            ),
            model_info: ModelInfo {
                provider: "gemini".to_string(),
                model: "gemini-pro".to_string(),
                prompt_version: "v1.0".to_string(),
                latency_ms: Some(120),
            },
            processing_time_ms: 120,
        }
    }

    /// A ticket creation request in the given category.
    pub fn ticket_request(title: &str, category: TicketCategory) -> CreateTicketRequest {
        CreateTicketRequest {
            title: title.to_string(),
            description: "Something is not working as expected.".to_string(),
            category,
            priority: TicketPriority::Medium,
            created_by: "user-1".to_string(),
        }
    }
}

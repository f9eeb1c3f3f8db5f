//! Decision engine: maps a classification result and the current policy to a
//! ticket disposition.
//!
//! Deliberately a pure function of its two arguments. No store access, no
//! clock, no side effects; the policy is injected per call so there is no
//! process-wide threshold state to go stale.

use serde::Serialize;

use crate::classifier::ClassificationResult;
use crate::policy::TriagePolicy;

/// Why a ticket was handed to a human instead of auto-closed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignReason {
    ConfidenceBelowThreshold,
    AutoCloseDisabled,
}

impl AssignReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignReason::ConfidenceBelowThreshold => "confidence_below_threshold",
            AssignReason::AutoCloseDisabled => "auto_close_disabled",
        }
    }
}

/// Disposition of a triaged ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum TriageDecision {
    /// Resolve the ticket automatically with the drafted reply.
    AutoClose { confidence: f32, threshold: f32 },
    /// Hand the ticket to a human agent.
    AssignToHuman {
        confidence: f32,
        threshold: f32,
        reason: AssignReason,
    },
}

/// Decide a ticket's disposition.
///
/// The effective threshold is the per-category override when present, the
/// global threshold otherwise. A confidence exactly equal to the threshold
/// auto-closes (inclusive boundary). Auto-close disabled wins over any
/// confidence.
pub fn decide(result: &ClassificationResult, policy: &TriagePolicy) -> TriageDecision {
    let threshold = policy.threshold_for(result.predicted_category);
    let confidence = result.confidence;

    if !policy.auto_close_enabled {
        return TriageDecision::AssignToHuman {
            confidence,
            threshold,
            reason: AssignReason::AutoCloseDisabled,
        };
    }

    if confidence >= threshold {
        TriageDecision::AutoClose {
            confidence,
            threshold,
        }
    } else {
        TriageDecision::AssignToHuman {
            confidence,
            threshold,
            reason: AssignReason::ConfidenceBelowThreshold,
        }
    }
}

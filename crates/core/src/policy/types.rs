//! Triage policy types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ticket::TicketCategory;

/// Runtime-mutable triage policy.
///
/// A single row, created lazily with defaults on first read. Workers load it
/// fresh for every triage decision; it is never cached across jobs, so an
/// operator change takes effect on the next job at the latest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriagePolicy {
    /// Master switch for automatic resolution.
    #[serde(default = "default_auto_close_enabled")]
    pub auto_close_enabled: bool,

    /// Global confidence threshold in [0, 1].
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Per-category threshold overrides. Categories absent from the map fall
    /// back to the global threshold.
    #[serde(default)]
    pub category_thresholds: BTreeMap<TicketCategory, f32>,

    /// Target first-response SLA in hours.
    #[serde(default = "default_sla_hours")]
    pub sla_hours: u32,

    /// Maximum triage delivery attempts per job.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_auto_close_enabled() -> bool {
    true
}

fn default_confidence_threshold() -> f32 {
    0.78
}

fn default_sla_hours() -> u32 {
    24
}

fn default_max_retries() -> u32 {
    3
}

impl Default for TriagePolicy {
    fn default() -> Self {
        let mut category_thresholds = BTreeMap::new();
        category_thresholds.insert(TicketCategory::Billing, 0.78);
        category_thresholds.insert(TicketCategory::Tech, 0.85);
        category_thresholds.insert(TicketCategory::Shipping, 0.75);
        category_thresholds.insert(TicketCategory::Other, 0.80);

        Self {
            auto_close_enabled: default_auto_close_enabled(),
            confidence_threshold: default_confidence_threshold(),
            category_thresholds,
            sla_hours: default_sla_hours(),
            max_retries: default_max_retries(),
        }
    }
}

impl TriagePolicy {
    /// Effective threshold for a category: the per-category override if
    /// present, else the global threshold.
    pub fn threshold_for(&self, category: TicketCategory) -> f32 {
        self.category_thresholds
            .get(&category)
            .copied()
            .unwrap_or(self.confidence_threshold)
    }
}

/// Partial policy update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyUpdate {
    pub auto_close_enabled: Option<bool>,
    pub confidence_threshold: Option<f32>,
    pub category_thresholds: Option<BTreeMap<TicketCategory, f32>>,
    pub sla_hours: Option<u32>,
    pub max_retries: Option<u32>,
}

impl PolicyUpdate {
    /// Validate all provided thresholds are in [0, 1].
    pub fn validate(&self) -> Result<(), String> {
        if let Some(t) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(format!("confidence_threshold out of range: {}", t));
            }
        }
        if let Some(ref overrides) = self.category_thresholds {
            for (category, t) in overrides {
                if !(0.0..=1.0).contains(t) {
                    return Err(format!("threshold for {} out of range: {}", category, t));
                }
            }
        }
        Ok(())
    }

    /// Apply this update on top of an existing policy.
    pub fn apply_to(&self, policy: &mut TriagePolicy) {
        if let Some(enabled) = self.auto_close_enabled {
            policy.auto_close_enabled = enabled;
        }
        if let Some(t) = self.confidence_threshold {
            policy.confidence_threshold = t;
        }
        if let Some(ref overrides) = self.category_thresholds {
            policy.category_thresholds = overrides.clone();
        }
        if let Some(h) = self.sla_hours {
            policy.sla_hours = h;
        }
        if let Some(r) = self.max_retries {
            policy.max_retries = r;
        }
    }
}

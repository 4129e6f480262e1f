//! Metrics for the refund desk workflows
//!
//! Counters and gauges keyed by the names in [`metric_names`], with a typed
//! [`WorkflowOutcomes`] view and a JSON snapshot for diagnostics.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Values {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
}

/// Registry shared by the session's workflow components
#[derive(Debug)]
pub struct MetricsRegistry {
    values: RwLock<Values>,
    started: Instant,
}

/// How submissions and reveals have ended so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowOutcomes {
    pub submissions_confirmed: u64,
    pub submissions_cancelled: u64,
    pub submissions_failed: u64,
    pub reveals_fast_path: u64,
    pub reveals_attested: u64,
    pub reveals_raced: u64,
    pub reveals_failed: u64,
    pub busy_rejections: u64,
    /// Records in the list after the last reload
    pub records_loaded: u64,
}

impl WorkflowOutcomes {
    pub fn reveals(&self) -> u64 {
        self.reveals_fast_path + self.reveals_attested + self.reveals_raced + self.reveals_failed
    }

    pub fn submissions(&self) -> u64 {
        self.submissions_confirmed + self.submissions_cancelled + self.submissions_failed
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(Values::default()),
            started: Instant::now(),
        }
    }

    pub async fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1).await;
    }

    pub async fn add_counter(&self, name: &str, value: u64) {
        let mut values = self.values.write().await;
        let counter = values.counters.entry(name.to_string()).or_default();
        *counter = counter.saturating_add(value);
    }

    pub async fn set_gauge(&self, name: &str, value: u64) {
        self.values
            .write()
            .await
            .gauges
            .insert(name.to_string(), value);
    }

    /// Zero for a counter never touched
    pub async fn get_counter(&self, name: &str) -> u64 {
        self.values
            .read()
            .await
            .counters
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub async fn get_gauge(&self, name: &str) -> u64 {
        self.values
            .read()
            .await
            .gauges
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub async fn outcomes(&self) -> WorkflowOutcomes {
        let values = self.values.read().await;
        let counter = |name: &str| values.counters.get(name).copied().unwrap_or(0);
        WorkflowOutcomes {
            submissions_confirmed: counter(metric_names::SUBMISSIONS_CONFIRMED),
            submissions_cancelled: counter(metric_names::SUBMISSIONS_CANCELLED),
            submissions_failed: counter(metric_names::SUBMISSIONS_FAILED),
            reveals_fast_path: counter(metric_names::REVEALS_FAST_PATH),
            reveals_attested: counter(metric_names::REVEALS_ATTESTED),
            reveals_raced: counter(metric_names::REVEALS_RACED),
            reveals_failed: counter(metric_names::REVEALS_FAILED),
            busy_rejections: counter(metric_names::BUSY_REJECTIONS),
            records_loaded: values
                .gauges
                .get(metric_names::RECORDS_LOADED)
                .copied()
                .unwrap_or(0),
        }
    }

    /// Snapshot of every metric plus the typed outcomes
    pub async fn to_json(&self) -> serde_json::Value {
        let outcomes = self.outcomes().await;
        let values = self.values.read().await;
        serde_json::json!({
            "uptime_seconds": self.uptime_seconds(),
            "outcomes": outcomes,
            "counters": values.counters,
            "gauges": values.gauges,
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard metric names
pub mod metric_names {
    // Submissions
    pub const SUBMISSIONS_CONFIRMED: &str = "refund_desk.submissions.confirmed";
    pub const SUBMISSIONS_CANCELLED: &str = "refund_desk.submissions.cancelled";
    pub const SUBMISSIONS_FAILED: &str = "refund_desk.submissions.failed";

    // Reveals
    pub const REVEALS_FAST_PATH: &str = "refund_desk.reveals.fast_path";
    pub const REVEALS_ATTESTED: &str = "refund_desk.reveals.attested";
    pub const REVEALS_RACED: &str = "refund_desk.reveals.already_verified";
    pub const REVEALS_FAILED: &str = "refund_desk.reveals.failed";

    // Record repository
    pub const RECORDS_LOADED: &str = "refund_desk.records.loaded";
    pub const RECORDS_SKIPPED: &str = "refund_desk.records.skipped";
    pub const RELOADS_FAILED: &str = "refund_desk.reloads.failed";

    // Guards
    pub const BUSY_REJECTIONS: &str = "refund_desk.busy_rejections";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter() {
        let registry = MetricsRegistry::new();

        registry.inc_counter(metric_names::REVEALS_FAST_PATH).await;
        registry.inc_counter(metric_names::REVEALS_FAST_PATH).await;
        registry.add_counter(metric_names::RECORDS_SKIPPED, 5).await;

        assert_eq!(registry.get_counter(metric_names::REVEALS_FAST_PATH).await, 2);
        assert_eq!(registry.get_counter(metric_names::RECORDS_SKIPPED).await, 5);
        assert_eq!(registry.get_counter("missing").await, 0);
    }

    #[tokio::test]
    async fn test_gauge() {
        let registry = MetricsRegistry::new();

        registry.set_gauge(metric_names::RECORDS_LOADED, 100).await;
        assert_eq!(registry.get_gauge(metric_names::RECORDS_LOADED).await, 100);

        registry.set_gauge(metric_names::RECORDS_LOADED, 3).await;
        assert_eq!(registry.get_gauge(metric_names::RECORDS_LOADED).await, 3);
    }

    #[tokio::test]
    async fn test_outcomes_view() {
        let registry = MetricsRegistry::new();
        registry.inc_counter(metric_names::REVEALS_FAST_PATH).await;
        registry.inc_counter(metric_names::REVEALS_FAILED).await;
        registry.inc_counter(metric_names::SUBMISSIONS_CANCELLED).await;
        registry.set_gauge(metric_names::RECORDS_LOADED, 4).await;

        let outcomes = registry.outcomes().await;
        assert_eq!(outcomes.reveals(), 2);
        assert_eq!(outcomes.submissions(), 1);
        assert_eq!(outcomes.submissions_cancelled, 1);
        assert_eq!(outcomes.records_loaded, 4);
        assert_eq!(outcomes.busy_rejections, 0);
    }

    #[tokio::test]
    async fn test_json_snapshot() {
        let registry = MetricsRegistry::new();
        registry.inc_counter(metric_names::SUBMISSIONS_CONFIRMED).await;

        let json = registry.to_json().await;
        assert_eq!(json["counters"][metric_names::SUBMISSIONS_CONFIRMED], 1);
        assert_eq!(json["outcomes"]["submissions_confirmed"], 1);
    }
}

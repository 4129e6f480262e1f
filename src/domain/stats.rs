//! Refund statistics and search over the local record list

use serde::Serialize;

use super::{refund_for, TaxRecord};

/// Aggregate refund figures, derived on demand from the record list.
///
/// Only attested records contribute to the refund totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TaxStats {
    pub total_refund: f64,
    pub average_refund: f64,
    pub pending_count: usize,
    pub verified_count: usize,
}

impl TaxStats {
    pub fn compute(records: &[TaxRecord]) -> Self {
        let verified: Vec<&TaxRecord> = records.iter().filter(|r| r.is_verified).collect();
        let total_refund: f64 = verified
            .iter()
            .map(|r| refund_for(r.attested_amount().unwrap_or(0)))
            .sum();
        let average_refund = if verified.is_empty() {
            0.0
        } else {
            total_refund / verified.len() as f64
        };

        Self {
            total_refund,
            average_refund,
            pending_count: records.len() - verified.len(),
            verified_count: verified.len(),
        }
    }
}

/// Records whose name or category contains `term`, case-insensitively
pub fn filter_records(records: &[TaxRecord], term: &str) -> Vec<TaxRecord> {
    records.iter().filter(|r| r.matches(term)).cloned().collect()
}

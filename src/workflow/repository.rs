//! Local record list rebuilt from the ledger
//!
//! The list is only ever replaced wholesale. Overlapping reloads are
//! allowed; whichever finishes last wins.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use crate::domain::{filter_records, TaxRecord, TaxStats};
use crate::infra::{ReadOnlyLedger, RefundError, Result};
use crate::metrics::{metric_names, MetricsRegistry};

/// Outcome of one reload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub loaded: usize,
    /// Ids whose fetch failed and were left out
    pub skipped: Vec<String>,
}

pub struct RecordRepository {
    ledger: Arc<dyn ReadOnlyLedger>,
    records: RwLock<Vec<TaxRecord>>,
    refreshing: AtomicUsize,
    metrics: Arc<MetricsRegistry>,
}

struct Refreshing<'a>(&'a AtomicUsize);

impl<'a> Refreshing<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Refreshing<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordRepository {
    pub fn new(ledger: Arc<dyn ReadOnlyLedger>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            ledger,
            records: RwLock::new(Vec::new()),
            refreshing: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Rebuild the list from the ledger.
    ///
    /// Fails with `LoadFailed` only when the id enumeration fails, in which
    /// case the current list is kept. Records that fail to load individually
    /// are logged and left out.
    pub async fn reload(&self) -> Result<ReloadReport> {
        let _refreshing = Refreshing::enter(&self.refreshing);

        let ids = match self.ledger.get_all_business_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                self.metrics.inc_counter(metric_names::RELOADS_FAILED).await;
                return Err(RefundError::LoadFailed(e.detail()));
            }
        };

        let mut records = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();
        for id in ids {
            match self.ledger.get_business_data(&id).await {
                Ok(data) => records.push(TaxRecord::from_ledger(id, data)),
                Err(e) => {
                    warn!(record_id = %id, error = %e, "Skipping record that failed to load");
                    skipped.push(id);
                }
            }
        }

        let report = ReloadReport {
            loaded: records.len(),
            skipped,
        };
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = records;

        self.metrics
            .set_gauge(metric_names::RECORDS_LOADED, report.loaded as u64)
            .await;
        if !report.skipped.is_empty() {
            self.metrics
                .add_counter(metric_names::RECORDS_SKIPPED, report.skipped.len() as u64)
                .await;
        }
        info!(
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "Tax records reloaded"
        );

        Ok(report)
    }

    /// Snapshot of the current list
    pub fn records(&self) -> Vec<TaxRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<TaxRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records matching `term` by name or category; the list is untouched
    pub fn search(&self, term: &str) -> Vec<TaxRecord> {
        filter_records(
            &self.records.read().unwrap_or_else(PoisonError::into_inner),
            term,
        )
    }

    pub fn stats(&self) -> TaxStats {
        TaxStats::compute(&self.records.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst) > 0
    }
}

//! Orchestrator wiring the session, repository and workflows together

use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{error, info};

use super::{
    BusyFlags, Notification, RecordRepository, ReloadReport, RevealProtocol, Revealed, Session,
    StatusConfig, SubmissionFlow, SubmissionReceipt,
};
use crate::domain::{RecordDetail, SubmissionForm, TaxRecord, TaxStats};
use crate::infra::{FheClient, ReadOnlyLedger, RefundError, Result, SignerLedger};
use crate::metrics::MetricsRegistry;

/// Dashboard configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardConfig {
    pub status: StatusConfig,
}

/// Entry point for a connected user's actions.
///
/// Each user action is handled here and ends with a status on the board;
/// only the typed outcome is returned to the caller.
pub struct Dashboard {
    session: Arc<Session>,
    repository: Arc<RecordRepository>,
    submission: SubmissionFlow,
    reveal: RevealProtocol,
    reader: Arc<dyn ReadOnlyLedger>,
    signer: Arc<dyn SignerLedger>,
    fhe: Arc<dyn FheClient>,
    metrics: Arc<MetricsRegistry>,
}

impl Dashboard {
    pub fn new(
        reader: Arc<dyn ReadOnlyLedger>,
        signer: Arc<dyn SignerLedger>,
        fhe: Arc<dyn FheClient>,
        config: DashboardConfig,
    ) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let session = Arc::new(Session::new(config.status));
        let repository = Arc::new(RecordRepository::new(reader.clone(), metrics.clone()));
        let submission = SubmissionFlow::new(
            session.clone(),
            repository.clone(),
            signer.clone(),
            fhe.clone(),
            reader.contract_address(),
            metrics.clone(),
        );
        let reveal = RevealProtocol::new(
            session.clone(),
            repository.clone(),
            reader.clone(),
            signer.clone(),
            fhe.clone(),
            metrics.clone(),
        );

        Self {
            session,
            repository,
            submission,
            reveal,
            reader,
            signer,
            fhe,
            metrics,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn repository(&self) -> &Arc<RecordRepository> {
        &self.repository
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn contract_address(&self) -> Address {
        self.reader.contract_address()
    }

    /// Connect a wallet, bring up the FHE client and load the records.
    ///
    /// Fails with `NotReady` when `account` is not the one the signer
    /// sends from, since encrypted inputs are bound to their sender.
    /// FHE and load failures are reported on the status board only.
    pub async fn connect(&self, account: Address) -> Result<()> {
        let signing = self.signer.account();
        if account != signing {
            error!(%account, signer = %signing, "Connected account is not the signing account");
            let err = RefundError::NotReady(format!(
                "connected account {account} does not match signing account {signing}"
            ));
            self.session.status().error(err.detail());
            return Err(err);
        }

        self.session.connect(account);
        let _ = self.initialize_fhe().await;
        let _ = self.load().await;
        Ok(())
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Initialize the FHE client unless it is ready or initializing.
    pub async fn initialize_fhe(&self) -> Result<()> {
        if !self.session.is_connected() || !self.session.begin_fhe_initialization() {
            return Ok(());
        }

        let outcome = if self.fhe.is_initialized() {
            Ok(())
        } else {
            self.fhe.initialize().await
        };
        self.session.finish_fhe_initialization(&outcome);

        match &outcome {
            Ok(()) => info!("FHE client ready"),
            Err(e) => {
                error!(error = %e, "FHE client initialization failed");
                self.session
                    .status()
                    .error("FHE initialization failed, check wallet connection");
            }
        }
        outcome
    }

    /// Reload the records. A no-op returning `None` while disconnected.
    pub async fn load(&self) -> Result<Option<ReloadReport>> {
        if !self.session.is_connected() {
            return Ok(None);
        }
        match self.repository.reload().await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                error!(error = %e, "Loading tax records failed");
                self.session.status().error("Failed to load records");
                Err(e)
            }
        }
    }

    pub async fn submit(&self, form: &mut SubmissionForm) -> Result<SubmissionReceipt> {
        self.submission.submit(form).await
    }

    pub async fn reveal(&self, business_id: &str) -> Option<u64> {
        self.reveal.reveal(business_id).await
    }

    pub async fn try_reveal(&self, business_id: &str) -> Result<Revealed> {
        self.reveal.try_reveal(business_id).await
    }

    /// Reveal the amount of an opened record.
    ///
    /// A value already revealed for this detail is returned as is. A newly
    /// revealed value is kept as the detail's provisional amount until the
    /// refreshed record carries the attested one.
    pub async fn reveal_detail(&self, detail: &mut RecordDetail) -> Option<u64> {
        if let Some(value) = detail.provisional() {
            return Some(value);
        }

        let id = detail.record().id.clone();
        let revealed = self.reveal(&id).await;
        if let Some(value) = revealed {
            detail.set_provisional(value);
        }
        if let Some(record) = self.repository.get(&id) {
            detail.refresh(record);
        }
        revealed
    }

    /// Reveal a detail's amount, or hide it again if this session already
    /// revealed it. Returns the value now shown from the reveal, if any.
    pub async fn toggle_detail(&self, detail: &mut RecordDetail) -> Option<u64> {
        if detail.provisional().is_some() {
            detail.hide();
            return None;
        }
        self.reveal_detail(detail).await
    }

    /// Ask the contract whether it is accepting traffic.
    pub async fn check_availability(&self) -> Result<bool> {
        match self.reader.is_available().await {
            Ok(available) => {
                let message = if available {
                    "System availability check passed"
                } else {
                    "System temporarily unavailable"
                };
                self.session.status().success(message);
                Ok(available)
            }
            Err(e) => {
                error!(error = %e, "Availability check failed");
                self.session.status().error("Availability check failed");
                Err(e)
            }
        }
    }

    pub fn records(&self) -> Vec<TaxRecord> {
        self.repository.records()
    }

    pub fn search(&self, term: &str) -> Vec<TaxRecord> {
        self.repository.search(term)
    }

    pub fn stats(&self) -> TaxStats {
        self.repository.stats()
    }

    /// Open a record for inspection
    pub fn open(&self, business_id: &str) -> Option<RecordDetail> {
        self.repository.get(business_id).map(RecordDetail::new)
    }

    pub fn busy(&self) -> BusyFlags {
        BusyFlags {
            refreshing: self.repository.is_refreshing(),
            ..self.session.busy()
        }
    }

    /// The status the renderer should show now
    pub fn status(&self) -> Option<Notification> {
        self.session.status().current()
    }
}

//! Encrypt a plaintext amount and file it on the ledger

use std::sync::Arc;

use alloy::primitives::{Address, TxHash};
use tracing::{error, info, warn};

use super::{RecordRepository, Session};
use crate::domain::{public_estimate, NewBusinessData, RecordIdGenerator, SubmissionForm};
use crate::infra::{FheClient, RefundError, Result, SignerLedger};
use crate::metrics::{metric_names, MetricsRegistry};

/// A confirmed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub record_id: String,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    /// Estimate attached as `publicValue1`
    pub public_estimate: u64,
}

pub struct SubmissionFlow {
    session: Arc<Session>,
    repository: Arc<RecordRepository>,
    signer: Arc<dyn SignerLedger>,
    fhe: Arc<dyn FheClient>,
    contract: Address,
    ids: RecordIdGenerator,
    metrics: Arc<MetricsRegistry>,
}

impl SubmissionFlow {
    pub fn new(
        session: Arc<Session>,
        repository: Arc<RecordRepository>,
        signer: Arc<dyn SignerLedger>,
        fhe: Arc<dyn FheClient>,
        contract: Address,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            session,
            repository,
            signer,
            fhe,
            contract,
            ids: RecordIdGenerator::new(),
            metrics,
        }
    }

    /// Encrypt, file and confirm the form's record, then reload and clear
    /// the form.
    ///
    /// Every failure is posted to the status board before it is returned,
    /// except `Busy`, which leaves the in-flight submission's status alone.
    pub async fn submit(&self, form: &mut SubmissionForm) -> Result<SubmissionReceipt> {
        let _in_flight = match self.session.submission_guard().try_acquire() {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Rejected submission while another is in flight");
                self.metrics.inc_counter(metric_names::BUSY_REJECTIONS).await;
                return Err(e);
            }
        };

        match self.run(form).await {
            Ok(receipt) => {
                self.metrics
                    .inc_counter(metric_names::SUBMISSIONS_CONFIRMED)
                    .await;
                self.session.status().success("Tax record uploaded!");

                if let Err(e) = self.repository.reload().await {
                    error!(error = %e, "Reload after submission failed");
                    self.session.status().error("Failed to load records");
                }
                form.clear();
                Ok(receipt)
            }
            Err(err) => {
                let counter = if err == RefundError::UserCancelled {
                    metric_names::SUBMISSIONS_CANCELLED
                } else {
                    metric_names::SUBMISSIONS_FAILED
                };
                self.metrics.inc_counter(counter).await;
                error!(error = %err, "Tax record submission failed");
                self.session.status().error(status_message(&err));
                Err(err)
            }
        }
    }

    async fn run(&self, form: &SubmissionForm) -> Result<SubmissionReceipt> {
        self.session.require_ready()?;
        // input proofs are bound to the sender of the creation call
        let account = self.signer.account();
        let amount = form
            .amount_value()
            .ok_or_else(|| RefundError::InvalidInput("amount does not fit in 64 bits".into()))?;
        let record_id = self.ids.next_id();

        self.session
            .status()
            .pending("Encrypting tax record with FHE...");

        let encrypted = {
            let _encrypting = self.session.encryption_guard().try_acquire()?;
            self.fhe
                .encrypt(self.contract, account, amount)
                .await
                .map_err(classify)?
        };

        let estimate = public_estimate(amount);
        let request = NewBusinessData {
            business_id: record_id.clone(),
            name: form.name.clone(),
            encrypted_value: encrypted.handle,
            input_proof: encrypted.proof,
            public_value1: estimate,
            public_value2: 0,
            description: form.category.note(),
        };

        let pending = self
            .signer
            .create_business_data(request)
            .await
            .map_err(classify)?;
        info!(record_id = %record_id, tx_hash = %pending.tx_hash(), "Creation transaction sent");

        self.session
            .status()
            .pending("Waiting for transaction confirmation...");
        let receipt = pending.wait().await.map_err(classify)?;

        info!(
            record_id = %record_id,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number.unwrap_or(0),
            "Tax record confirmed"
        );

        Ok(SubmissionReceipt {
            record_id,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            public_estimate: estimate,
        })
    }
}

/// Map a collaborator failure onto the submission taxonomy
fn classify(err: RefundError) -> RefundError {
    if err.is_user_rejection() {
        return RefundError::UserCancelled;
    }
    match err {
        RefundError::NotReady(_) | RefundError::Busy(_) | RefundError::InvalidInput(_) => err,
        RefundError::SubmissionFailed(_) => err,
        other => RefundError::SubmissionFailed(other.detail()),
    }
}

fn status_message(err: &RefundError) -> String {
    match err {
        RefundError::UserCancelled => "User cancelled the transaction".to_string(),
        RefundError::SubmissionFailed(detail) => format!("Submission failed: {detail}"),
        other => other.detail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Operation;

    #[test]
    fn test_classify_rejection() {
        let err = classify(RefundError::Ledger(
            "user rejected transaction (code=ACTION_REJECTED)".into(),
        ));
        assert_eq!(err, RefundError::UserCancelled);
    }

    #[test]
    fn test_classify_other_failures() {
        assert_eq!(
            classify(RefundError::Fhe("relayer returned 502".into())),
            RefundError::SubmissionFailed("relayer returned 502".into())
        );
        assert_eq!(
            classify(RefundError::Busy(Operation::Encryption)),
            RefundError::Busy(Operation::Encryption)
        );
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(
            status_message(&RefundError::UserCancelled),
            "User cancelled the transaction"
        );
        assert_eq!(
            status_message(&RefundError::SubmissionFailed("out of gas".into())),
            "Submission failed: out of gas"
        );
        assert_eq!(
            status_message(&RefundError::NotReady("please connect your wallet first".into())),
            "please connect your wallet first"
        );
    }
}

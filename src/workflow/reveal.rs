//! Two-phase reveal: local decryption with proof, then on-chain attestation
//!
//! A record that is already attested is answered from the ledger without
//! any decryption work. Otherwise the FHE client decrypts the record's
//! handle and hands the proof to an [`AttestationSubmitter`], which sends
//! `verifyDecryption` and waits for it to be mined before the decryption
//! call is allowed to resolve.

use std::sync::{Arc, OnceLock};

use alloy::primitives::{Bytes, TxHash};
use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{RecordRepository, Session};
use crate::domain::TxReceipt;
use crate::infra::{
    FheClient, PendingTx, ProofSubmitter, ReadOnlyLedger, RefundError, Result, SignerLedger,
};
use crate::metrics::{metric_names, MetricsRegistry};

/// How a reveal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revealed {
    /// Record was attested before this call; no decryption ran
    AlreadyAttested(u64),
    /// Decrypted here and attested by `tx_hash`
    Attested { value: u64, tx_hash: TxHash },
    /// Another verifier attested first. The value must be read from the
    /// reloaded record.
    AttestedElsewhere,
}

impl Revealed {
    /// Value to hand back to the caller
    pub fn value(&self) -> Option<u64> {
        match self {
            Revealed::AlreadyAttested(v) | Revealed::Attested { value: v, .. } => Some(*v),
            Revealed::AttestedElsewhere => None,
        }
    }
}

/// Sends the attestation for one record, at most once.
pub struct AttestationSubmitter<'a> {
    signer: &'a dyn SignerLedger,
    session: &'a Session,
    business_id: &'a str,
    receipt: OnceLock<TxReceipt>,
}

impl<'a> AttestationSubmitter<'a> {
    pub fn new(signer: &'a dyn SignerLedger, session: &'a Session, business_id: &'a str) -> Self {
        Self {
            signer,
            session,
            business_id,
            receipt: OnceLock::new(),
        }
    }

    /// Receipt of the confirmed attestation, once there is one
    pub fn receipt(&self) -> Option<TxReceipt> {
        self.receipt.get().copied()
    }
}

#[async_trait]
impl<'a> ProofSubmitter for AttestationSubmitter<'a> {
    async fn submit_proof(
        &self,
        abi_encoded_clear_values: Bytes,
        decryption_proof: Bytes,
    ) -> Result<PendingTx> {
        if self.receipt.get().is_some() {
            return Err(RefundError::DecryptionFailed(format!(
                "attestation for {} already submitted",
                self.business_id
            )));
        }

        self.session
            .status()
            .pending("Verifying decryption on-chain...");
        let pending = self
            .signer
            .verify_decryption(self.business_id, abi_encoded_clear_values, decryption_proof)
            .await?;
        info!(record_id = %self.business_id, tx_hash = %pending.tx_hash(), "Attestation transaction sent");

        // Confirm here so nothing downstream can observe pre-attestation state
        let receipt = pending.wait().await?;
        let _ = self.receipt.set(receipt);
        Ok(PendingTx::confirmed(receipt))
    }
}

pub struct RevealProtocol {
    session: Arc<Session>,
    repository: Arc<RecordRepository>,
    reader: Arc<dyn ReadOnlyLedger>,
    signer: Arc<dyn SignerLedger>,
    fhe: Arc<dyn FheClient>,
    metrics: Arc<MetricsRegistry>,
}

impl RevealProtocol {
    pub fn new(
        session: Arc<Session>,
        repository: Arc<RecordRepository>,
        reader: Arc<dyn ReadOnlyLedger>,
        signer: Arc<dyn SignerLedger>,
        fhe: Arc<dyn FheClient>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            session,
            repository,
            reader,
            signer,
            fhe,
            metrics,
        }
    }

    /// Reveal a record's amount.
    ///
    /// Returns `None` when the reveal failed, was rejected as busy, or was
    /// settled by another verifier. Failures are posted to the status board.
    pub async fn reveal(&self, business_id: &str) -> Option<u64> {
        match self.try_reveal(business_id).await {
            Ok(revealed) => revealed.value(),
            Err(RefundError::Busy(_)) => None,
            Err(err) => {
                self.metrics.inc_counter(metric_names::REVEALS_FAILED).await;
                error!(record_id = %business_id, error = %err, "Reveal failed");
                let message = match &err {
                    RefundError::NotReady(detail) => detail.clone(),
                    other => format!("Decryption failed: {}", other.detail()),
                };
                self.session.status().error(message);
                None
            }
        }
    }

    /// Reveal a record's amount, reporting the path taken.
    pub async fn try_reveal(&self, business_id: &str) -> Result<Revealed> {
        self.session.require_account()?;
        let _in_flight = match self.session.decryption_guard().try_acquire() {
            Ok(slot) => slot,
            Err(e) => {
                self.metrics.inc_counter(metric_names::BUSY_REJECTIONS).await;
                return Err(e);
            }
        };
        let status = self.session.status();

        let data = self
            .reader
            .get_business_data(business_id)
            .await
            .map_err(|e| RefundError::DecryptionFailed(e.detail()))?;
        if data.is_verified {
            info!(record_id = %business_id, "Record already attested; skipping decryption");
            self.metrics.inc_counter(metric_names::REVEALS_FAST_PATH).await;
            status.success("Data already verified on-chain");
            return Ok(Revealed::AlreadyAttested(data.decrypted_value));
        }

        self.session.require_fhe_ready()?;
        let handle = self
            .reader
            .get_encrypted_value(business_id)
            .await
            .map_err(|e| RefundError::DecryptionFailed(e.detail()))?;

        status.pending("Decrypting and generating proof...");
        let submitter = AttestationSubmitter::new(self.signer.as_ref(), &self.session, business_id);
        let outcome = self
            .fhe
            .verify_decryption(&[handle], self.reader.contract_address(), &submitter)
            .await;

        match outcome {
            Ok(verified) => {
                let attestation = submitter.receipt().ok_or_else(|| {
                    RefundError::DecryptionFailed(
                        "decryption resolved without an on-chain attestation".into(),
                    )
                })?;
                // the ledger is attested from here on, whatever follows
                self.reload_quietly().await;
                let value = verified
                    .decryption_result
                    .value_for(&handle)
                    .ok_or_else(|| {
                        RefundError::DecryptionFailed(format!("no clear value for handle {handle}"))
                    })?;

                self.metrics.inc_counter(metric_names::REVEALS_ATTESTED).await;
                info!(
                    record_id = %business_id,
                    tx_hash = %attestation.tx_hash,
                    "Decryption attested on-chain"
                );
                status.success("Data decrypted and verified!");
                Ok(Revealed::Attested {
                    value,
                    tx_hash: attestation.tx_hash,
                })
            }
            Err(err) if err.is_already_verified() => {
                warn!(record_id = %business_id, "Record was attested by another verifier");
                self.metrics.inc_counter(metric_names::REVEALS_RACED).await;
                self.reload_quietly().await;
                status.success("Data already verified on-chain");
                Ok(Revealed::AttestedElsewhere)
            }
            Err(err) => {
                if submitter.receipt().is_some() {
                    self.reload_quietly().await;
                }
                Err(RefundError::DecryptionFailed(err.detail()))
            }
        }
    }

    async fn reload_quietly(&self) {
        if let Err(e) = self.repository.reload().await {
            warn!(error = %e, "Reload after attestation failed");
        }
    }
}

//! Trait definitions for the collaborators the workflows drive

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    BusinessData, CiphertextHandle, EncryptedInput, NewBusinessData, TxReceipt,
    VerifiedDecryption,
};

use super::Result;

type Confirmation = Pin<Box<dyn Future<Output = Result<TxReceipt>> + Send>>;

/// A submitted transaction that can be awaited until it is mined.
///
/// Dropping it does not cancel the transaction; it only stops waiting.
pub struct PendingTx {
    tx_hash: TxHash,
    confirmation: Confirmation,
}

impl PendingTx {
    pub fn new<F>(tx_hash: TxHash, confirmation: F) -> Self
    where
        F: Future<Output = Result<TxReceipt>> + Send + 'static,
    {
        Self {
            tx_hash,
            confirmation: Box::pin(confirmation),
        }
    }

    /// A transaction that is already mined
    pub fn confirmed(receipt: TxReceipt) -> Self {
        Self::new(receipt.tx_hash, async move { Ok(receipt) })
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Wait for inclusion
    pub async fn wait(self) -> Result<TxReceipt> {
        self.confirmation.await
    }
}

impl fmt::Debug for PendingTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTx")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

/// Read-only view of the refund ledger contract.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReadOnlyLedger: Send + Sync {
    /// Address of the ledger contract
    fn contract_address(&self) -> Address;

    /// Every business id known to the contract
    async fn get_all_business_ids(&self) -> Result<Vec<String>>;

    /// Public fields of one record
    async fn get_business_data(&self, business_id: &str) -> Result<BusinessData>;

    /// Handle of the record's encrypted amount
    async fn get_encrypted_value(&self, business_id: &str) -> Result<CiphertextHandle>;

    /// Whether the contract accepts traffic
    async fn is_available(&self) -> Result<bool>;
}

/// Ledger handle bound to the connected account's signer.
///
/// Both calls return once the transaction is broadcast; callers await
/// [`PendingTx::wait`] for confirmation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignerLedger: Send + Sync {
    /// Account that signs transactions
    fn account(&self) -> Address;

    /// Store a new encrypted record
    async fn create_business_data(&self, request: NewBusinessData) -> Result<PendingTx>;

    /// Attest the clear value of a record's ciphertext
    async fn verify_decryption(
        &self,
        business_id: &str,
        abi_encoded_clear_values: Bytes,
        decryption_proof: Bytes,
    ) -> Result<PendingTx>;
}

/// Receives the cleared values and decryption proof once they exist.
#[async_trait]
pub trait ProofSubmitter: Send + Sync {
    async fn submit_proof(
        &self,
        abi_encoded_clear_values: Bytes,
        decryption_proof: Bytes,
    ) -> Result<PendingTx>;
}

/// Client side of the FHE scheme.
#[async_trait]
pub trait FheClient: Send + Sync {
    /// Load keys and parameters. Idempotent once ready.
    async fn initialize(&self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Encrypt `value` as an input to `contract` from `account`
    async fn encrypt(
        &self,
        contract: Address,
        account: Address,
        value: u64,
    ) -> Result<EncryptedInput>;

    /// Decrypt `handles` and prove it.
    ///
    /// Implementations hand the proof to `on_proof_ready` only after local
    /// decryption succeeded, and resolve only after the returned transaction
    /// is confirmed.
    async fn verify_decryption(
        &self,
        handles: &[CiphertextHandle],
        contract: Address,
        on_proof_ready: &dyn ProofSubmitter,
    ) -> Result<VerifiedDecryption>;
}

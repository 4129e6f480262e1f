//! Error types for the refund desk workflows

use thiserror::Error;

use crate::workflow::Operation;

/// Phrase the wallet reports when the user declines to sign.
pub const USER_REJECTED_PHRASE: &str = "user rejected transaction";

/// Revert reason the ledger returns when a record was attested already.
pub const ALREADY_VERIFIED_PHRASE: &str = "Data already verified";

/// Errors that can occur while encrypting, submitting or revealing records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefundError {
    /// Wallet session or FHE client not ready
    #[error("not ready: {0}")]
    NotReady(String),

    /// Another operation of the same kind is in flight
    #[error("busy: {0} already in progress")]
    Busy(Operation),

    /// Signing was declined in the wallet
    #[error("user cancelled the transaction")]
    UserCancelled,

    /// Creation transaction failed
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    /// Attestation raced with another verifier
    #[error("data already verified on-chain")]
    AlreadyVerified,

    /// Local decryption or attestation failed
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Record list could not be rebuilt
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// Record id unknown to the ledger
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Rejected user input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Raw ledger transport or revert error
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Raw FHE client error
    #[error("fhe client error: {0}")]
    Fhe(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RefundError {
    /// Whether the underlying message carries the wallet's rejection phrase.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, RefundError::UserCancelled) || self.to_string().contains(USER_REJECTED_PHRASE)
    }

    /// Whether the underlying message reports a prior attestation.
    pub fn is_already_verified(&self) -> bool {
        matches!(self, RefundError::AlreadyVerified)
            || self.to_string().contains(ALREADY_VERIFIED_PHRASE)
    }

    /// Message of the collaborator error without our prefix.
    pub fn detail(&self) -> String {
        match self {
            RefundError::NotReady(m)
            | RefundError::SubmissionFailed(m)
            | RefundError::DecryptionFailed(m)
            | RefundError::LoadFailed(m)
            | RefundError::RecordNotFound(m)
            | RefundError::InvalidInput(m)
            | RefundError::Ledger(m)
            | RefundError::Fhe(m)
            | RefundError::Configuration(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for refund desk operations
pub type Result<T> = std::result::Result<T, RefundError>;

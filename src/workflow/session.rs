//! Session state: wallet connection, FHE client readiness and status
//!
//! One `Session` exists per connected user. Workflow components receive it
//! explicitly and move it through the transitions defined here.

use std::sync::{PoisonError, RwLock};

use alloy::primitives::Address;
use serde::Serialize;

use super::{Operation, OperationGuard, StatusBoard, StatusConfig};
use crate::infra::{RefundError, Result};

/// Wallet connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected { account: Address },
}

/// FHE client lifecycle as seen by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FheState {
    Uninitialized,
    Initializing,
    Ready,
    /// Initialization failed; may be retried
    Failed(String),
}

/// Independent busy flags for the UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusyFlags {
    pub submitting: bool,
    pub encrypting: bool,
    pub decrypting: bool,
    pub refreshing: bool,
}

#[derive(Debug)]
pub struct Session {
    connection: RwLock<ConnectionState>,
    fhe: RwLock<FheState>,
    status: StatusBoard,
    submission: OperationGuard,
    encryption: OperationGuard,
    decryption: OperationGuard,
}

impl Session {
    pub fn new(status: StatusConfig) -> Self {
        Self {
            connection: RwLock::new(ConnectionState::Disconnected),
            fhe: RwLock::new(FheState::Uninitialized),
            status: StatusBoard::new(status),
            submission: OperationGuard::new(Operation::Submission),
            encryption: OperationGuard::new(Operation::Encryption),
            decryption: OperationGuard::new(Operation::Decryption),
        }
    }

    pub fn connect(&self, account: Address) {
        tracing::info!(%account, "Wallet connected");
        *self.connection.write().unwrap_or_else(PoisonError::into_inner) =
            ConnectionState::Connected { account };
    }

    pub fn disconnect(&self) {
        tracing::info!("Wallet disconnected");
        *self.connection.write().unwrap_or_else(PoisonError::into_inner) =
            ConnectionState::Disconnected;
    }

    pub fn connection(&self) -> ConnectionState {
        *self.connection.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn account(&self) -> Option<Address> {
        match self.connection() {
            ConnectionState::Connected { account } => Some(account),
            ConnectionState::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.account().is_some()
    }

    pub fn fhe_state(&self) -> FheState {
        self.fhe.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_fhe_ready(&self) -> bool {
        self.fhe_state() == FheState::Ready
    }

    /// Move to `Initializing` unless already ready or initializing.
    ///
    /// Returns whether the caller should run the initialization.
    pub fn begin_fhe_initialization(&self) -> bool {
        let mut fhe = self.fhe.write().unwrap_or_else(PoisonError::into_inner);
        match *fhe {
            FheState::Ready | FheState::Initializing => false,
            FheState::Uninitialized | FheState::Failed(_) => {
                *fhe = FheState::Initializing;
                true
            }
        }
    }

    pub fn finish_fhe_initialization(&self, outcome: &Result<()>) {
        let next = match outcome {
            Ok(()) => FheState::Ready,
            Err(e) => FheState::Failed(e.detail()),
        };
        *self.fhe.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Connected account, or `NotReady`
    pub fn require_account(&self) -> Result<Address> {
        self.account()
            .ok_or_else(|| RefundError::NotReady("please connect your wallet first".into()))
    }

    pub fn require_fhe_ready(&self) -> Result<()> {
        match self.fhe_state() {
            FheState::Ready => Ok(()),
            FheState::Initializing => Err(RefundError::NotReady(
                "FHE client is still initializing".into(),
            )),
            FheState::Uninitialized | FheState::Failed(_) => Err(RefundError::NotReady(
                "FHE client is not initialized".into(),
            )),
        }
    }

    /// Connected account with a ready FHE client
    pub fn require_ready(&self) -> Result<Address> {
        let account = self.require_account()?;
        self.require_fhe_ready()?;
        Ok(account)
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn submission_guard(&self) -> &OperationGuard {
        &self.submission
    }

    pub fn encryption_guard(&self) -> &OperationGuard {
        &self.encryption
    }

    pub fn decryption_guard(&self) -> &OperationGuard {
        &self.decryption
    }

    /// Busy flags for the guarded operations; `refreshing` is filled in by
    /// the record repository.
    pub fn busy(&self) -> BusyFlags {
        BusyFlags {
            submitting: self.submission.is_held(),
            encrypting: self.encryption.is_held(),
            decrypting: self.decryption.is_held(),
            refreshing: false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(StatusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_connection_then_fhe() {
        let session = Session::default();
        assert!(matches!(
            session.require_ready(),
            Err(RefundError::NotReady(_))
        ));

        session.connect(Address::repeat_byte(7));
        assert!(matches!(
            session.require_ready(),
            Err(RefundError::NotReady(_))
        ));
        assert_eq!(session.require_account().unwrap(), Address::repeat_byte(7));

        assert!(session.begin_fhe_initialization());
        session.finish_fhe_initialization(&Ok(()));
        assert_eq!(session.require_ready().unwrap(), Address::repeat_byte(7));
    }

    #[test]
    fn test_fhe_initialization_runs_once() {
        let session = Session::default();
        assert!(session.begin_fhe_initialization());
        assert!(!session.begin_fhe_initialization());
        session.finish_fhe_initialization(&Ok(()));
        assert!(!session.begin_fhe_initialization());
    }

    #[test]
    fn test_failed_initialization_can_retry() {
        let session = Session::default();
        assert!(session.begin_fhe_initialization());
        session.finish_fhe_initialization(&Err(RefundError::Fhe("no relayer".into())));
        assert_eq!(session.fhe_state(), FheState::Failed("no relayer".into()));
        assert!(session.begin_fhe_initialization());
    }

    #[test]
    fn test_disconnect() {
        let session = Session::default();
        session.connect(Address::ZERO);
        session.disconnect();
        assert_eq!(session.connection(), ConnectionState::Disconnected);
        assert!(session.require_account().is_err());
    }
}

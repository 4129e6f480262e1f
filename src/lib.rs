//! FHE Refund Desk Library
//!
//! Client-side workflows for filing encrypted tax records on an FHE-enabled
//! ledger and revealing their refund amounts through a verified decryption.
//!
//! ## Modules
//!
//! - [`domain`] - Records, categories, refund arithmetic and statistics
//! - [`infra`] - Error taxonomy and the ledger/FHE collaborator traits
//! - [`ledger`] - alloy-backed contract bindings
//! - [`workflow`] - Session, status board, submission and reveal flows
//! - [`metrics`] - In-process counters and gauges
//! - [`telemetry`] - Structured logging setup

pub mod domain;
pub mod infra;
pub mod ledger;
pub mod metrics;
pub mod telemetry;
pub mod workflow;

// Re-export commonly used types
pub use domain::{
    BusinessData, CiphertextHandle, RecordDetail, SubmissionForm, TaxCategory, TaxRecord,
    TaxStats,
};

pub use infra::{FheClient, ProofSubmitter, ReadOnlyLedger, RefundError, Result, SignerLedger};

pub use workflow::{Dashboard, DashboardConfig, Revealed, StatusKind};

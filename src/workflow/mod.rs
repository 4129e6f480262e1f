//! Client-side workflows around the encrypted ledger
//!
//! - `session` - connection, FHE readiness and the shared status board
//! - `repository` - local record list rebuilt from the ledger
//! - `submission` - encrypt and file a new record
//! - `reveal` - decrypt a record and attest the result on-chain
//! - `dashboard` - orchestrator for user actions

mod dashboard;
mod guard;
mod repository;
mod reveal;
mod session;
mod status;
mod submission;

pub use dashboard::{Dashboard, DashboardConfig};
pub use guard::{InFlight, Operation, OperationGuard};
pub use repository::{RecordRepository, ReloadReport};
pub use reveal::{AttestationSubmitter, RevealProtocol, Revealed};
pub use session::{BusyFlags, ConnectionState, FheState, Session};
pub use status::{Notification, StatusBoard, StatusConfig, StatusKind};
pub use submission::{SubmissionFlow, SubmissionReceipt};

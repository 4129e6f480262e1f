//! Single-slot guards for user-initiated operations
//!
//! Each guard admits one operation at a time. A second request while the
//! slot is held is rejected with [`RefundError::Busy`] instead of queueing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::infra::{RefundError, Result};

/// Kinds of operation that hold a guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Submission,
    Encryption,
    Decryption,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Submission => write!(f, "submission"),
            Operation::Encryption => write!(f, "encryption"),
            Operation::Decryption => write!(f, "decryption"),
        }
    }
}

/// Admits at most one in-flight operation of its kind.
#[derive(Debug)]
pub struct OperationGuard {
    operation: Operation,
    held: Arc<AtomicBool>,
}

impl OperationGuard {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the slot, or fail with `Busy` if it is taken
    pub fn try_acquire(&self) -> Result<InFlight> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RefundError::Busy(self.operation))?;
        Ok(InFlight {
            operation: self.operation,
            held: self.held.clone(),
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

/// Proof of holding a guard's slot; releases it on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as this is dropped"]
pub struct InFlight {
    operation: Operation,
    held: Arc<AtomicBool>,
}

impl InFlight {
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

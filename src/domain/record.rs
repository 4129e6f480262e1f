//! Tax records as stored on the ledger and as shown to the user

use std::sync::atomic::{AtomicI64, Ordering};

use alloy::primitives::{Address, Bytes};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{category_from_note, refund_for, CiphertextHandle};

/// Prefix of client-assigned record identifiers
pub const RECORD_ID_PREFIX: &str = "tax-record-";

/// Fields returned by the ledger's `getBusinessData` view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessData {
    pub name: String,
    pub public_value1: u64,
    pub public_value2: u64,
    /// Creation note, `"Tax receipt: <category>"` for records filed here
    pub description: String,
    pub creator: Address,
    /// Seconds since epoch, set by the contract
    pub timestamp: u64,
    pub is_verified: bool,
    /// Only meaningful when `is_verified` is set
    pub decrypted_value: u64,
}

/// Arguments of the ledger's `createBusinessData` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBusinessData {
    pub business_id: String,
    pub name: String,
    pub encrypted_value: CiphertextHandle,
    pub input_proof: Bytes,
    pub public_value1: u64,
    pub public_value2: u64,
    pub description: String,
}

/// One on-chain tax record, normalized for local use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub timestamp: u64,
    pub creator: Address,
    /// Refund estimate computed at creation
    pub public_value1: u64,
    /// Reserved
    pub public_value2: u64,
    pub is_verified: bool,
    /// Attested plaintext amount. Never set unless `is_verified`.
    pub decrypted_value: Option<u64>,
}

impl TaxRecord {
    /// Normalize a ledger view into a record.
    pub fn from_ledger(id: impl Into<String>, data: BusinessData) -> Self {
        Self {
            id: id.into(),
            category: category_from_note(&data.description),
            name: data.name,
            timestamp: data.timestamp,
            creator: data.creator,
            public_value1: data.public_value1,
            public_value2: data.public_value2,
            is_verified: data.is_verified,
            decrypted_value: data.is_verified.then_some(data.decrypted_value),
        }
    }

    /// The attested amount, if any
    pub fn attested_amount(&self) -> Option<u64> {
        if self.is_verified {
            self.decrypted_value
        } else {
            None
        }
    }

    /// Whether the record matches a case-insensitive search term
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.category.to_lowercase().contains(&term)
    }
}

/// How a record's amount may be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountView {
    /// Attested on-chain; authoritative
    Attested(u64),
    /// Decrypted in this session but not (yet) reflected on-chain
    Provisional(u64),
    /// Still encrypted
    Hidden,
}

impl AmountView {
    pub fn value(&self) -> Option<u64> {
        match self {
            AmountView::Attested(v) | AmountView::Provisional(v) => Some(*v),
            AmountView::Hidden => None,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(self, AmountView::Attested(_))
    }
}

/// A record opened for inspection, with any value revealed this session.
///
/// The provisional value is kept apart from the record's attested field so
/// a local decryption never masquerades as ledger truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDetail {
    record: TaxRecord,
    provisional: Option<u64>,
}

impl RecordDetail {
    pub fn new(record: TaxRecord) -> Self {
        Self {
            record,
            provisional: None,
        }
    }

    pub fn record(&self) -> &TaxRecord {
        &self.record
    }

    pub fn provisional(&self) -> Option<u64> {
        self.provisional
    }

    pub fn set_provisional(&mut self, value: u64) {
        self.provisional = Some(value);
    }

    /// Forget the value revealed this session
    pub fn hide(&mut self) {
        self.provisional = None;
    }

    /// Swap in a refreshed copy of the record, keeping the revealed value.
    pub fn refresh(&mut self, record: TaxRecord) {
        self.record = record;
    }

    pub fn amount_view(&self) -> AmountView {
        match (self.record.attested_amount(), self.provisional) {
            (Some(v), _) => AmountView::Attested(v),
            (None, Some(v)) => AmountView::Provisional(v),
            (None, None) => AmountView::Hidden,
        }
    }

    /// Refund estimate on the best amount available, zero when hidden
    pub fn estimated_refund(&self) -> f64 {
        refund_for(self.amount_view().value().unwrap_or(0))
    }
}

/// Generates `tax-record-<millis>` ids, strictly increasing within a session.
///
/// Two ids requested in the same millisecond are bumped apart. Nothing here
/// guarantees uniqueness across sessions.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    last: AtomicI64,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        self.next_at(Utc::now().timestamp_millis())
    }

    pub fn next_at(&self, now_millis: i64) -> String {
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now_millis.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        format!("{}{}", RECORD_ID_PREFIX, now_millis.max(previous + 1))
    }
}

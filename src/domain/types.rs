//! Core type definitions for the refund desk
//!
//! Ledger-facing primitives, tax categories and the refund arithmetic shared
//! by submission, statistics and display.

use alloy::primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Opaque reference to an encrypted value held by the ledger
pub type CiphertextHandle = B256;

/// Refund rate applied to attested amounts
pub const REFUND_RATE: f64 = 0.15;

/// Refund rate in percent, for integer estimates sent on-chain
pub const REFUND_RATE_PERCENT: u64 = 15;

/// Prefix of the creation note carrying the category
pub const CATEGORY_NOTE_PREFIX: &str = "Tax receipt: ";

/// Category used when a record's note carries none
pub const FALLBACK_CATEGORY: &str = "tax";

/// Integer refund estimate stored in `publicValue1` at creation.
///
/// Floors fractional cents so the value fits a `uint256`.
pub fn public_estimate(amount: u64) -> u64 {
    (amount as u128 * REFUND_RATE_PERCENT as u128 / 100) as u64
}

/// Refund owed on an amount
pub fn refund_for(amount: u64) -> f64 {
    amount as f64 * REFUND_RATE
}

/// Refund rendered with two decimals
pub fn format_refund(amount: u64) -> String {
    format!("{:.2}", refund_for(amount))
}

/// Kind of tax receipt a record was filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaxCategory {
    #[default]
    Income,
    Expense,
    Deduction,
    Other,
}

impl TaxCategory {
    pub const ALL: [TaxCategory; 4] = [
        TaxCategory::Income,
        TaxCategory::Expense,
        TaxCategory::Deduction,
        TaxCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxCategory::Income => "income",
            TaxCategory::Expense => "expense",
            TaxCategory::Deduction => "deduction",
            TaxCategory::Other => "other",
        }
    }

    /// Note attached to the creation call
    pub fn note(&self) -> String {
        format!("{}{}", CATEGORY_NOTE_PREFIX, self.as_str())
    }
}

impl fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TaxCategory::Income),
            "expense" => Ok(TaxCategory::Expense),
            "deduction" => Ok(TaxCategory::Deduction),
            "other" => Ok(TaxCategory::Other),
            other => Err(format!("unknown tax category: {other}")),
        }
    }
}

/// Recover the category label from a creation note.
///
/// Labels are not enforced by the ledger, so unknown ones pass through.
pub fn category_from_note(note: &str) -> String {
    match note.strip_prefix(CATEGORY_NOTE_PREFIX) {
        Some(label) if !label.trim().is_empty() => label.trim().to_string(),
        _ => FALLBACK_CATEGORY.to_string(),
    }
}

/// Ciphertext and input proof produced by the FHE client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    /// Handle of the encrypted input
    pub handle: CiphertextHandle,
    /// Proof that the ciphertext is well formed
    pub proof: Bytes,
}

/// Cleared values keyed by the handle they decrypt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptionResult {
    pub clear_values: HashMap<CiphertextHandle, u64>,
}

impl DecryptionResult {
    pub fn value_for(&self, handle: &CiphertextHandle) -> Option<u64> {
        self.clear_values.get(handle).copied()
    }
}

/// Outcome of a decryption whose proof was attested on-chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDecryption {
    pub decryption_result: DecryptionResult,
    pub attestation: TxReceipt,
}

/// Confirmed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_estimate() {
        assert_eq!(public_estimate(1000), 150);
        assert_eq!(public_estimate(0), 0);
        // 1001 * 0.15 = 150.15, floored
        assert_eq!(public_estimate(1001), 150);
        assert_eq!(public_estimate(u64::MAX), (u64::MAX as u128 * 15 / 100) as u64);
    }

    #[test]
    fn test_format_refund() {
        assert_eq!(format_refund(2000), "300.00");
        assert_eq!(format_refund(1), "0.15");
        assert_eq!(format_refund(0), "0.00");
    }

    #[test]
    fn test_category_note_round_trip() {
        for category in TaxCategory::ALL {
            assert_eq!(category_from_note(&category.note()), category.as_str());
        }
    }

    #[test]
    fn test_category_from_foreign_note() {
        assert_eq!(category_from_note(""), "tax");
        assert_eq!(category_from_note("quarterly filing"), "tax");
        assert_eq!(category_from_note("Tax receipt: donation"), "donation");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Income".parse::<TaxCategory>(), Ok(TaxCategory::Income));
        assert!("salary".parse::<TaxCategory>().is_err());
    }
}

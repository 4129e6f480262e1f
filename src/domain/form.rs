//! Input form for new tax records

use super::TaxCategory;

/// User-entered fields of a record about to be encrypted and filed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionForm {
    pub name: String,
    amount: String,
    pub category: TaxCategory,
}

impl SubmissionForm {
    pub fn new(name: impl Into<String>, amount: &str, category: TaxCategory) -> Self {
        let mut form = Self {
            name: name.into(),
            amount: String::new(),
            category,
        };
        form.set_amount(amount);
        form
    }

    /// Store the amount text, keeping digits only
    pub fn set_amount(&mut self, raw: &str) {
        self.amount = raw.chars().filter(char::is_ascii_digit).collect();
    }

    pub fn amount_text(&self) -> &str {
        &self.amount
    }

    /// Parsed amount; empty input counts as zero.
    pub fn amount_value(&self) -> Option<u64> {
        if self.amount.is_empty() {
            return Some(0);
        }
        self.amount.parse().ok()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

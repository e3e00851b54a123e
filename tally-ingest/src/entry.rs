//! New expenses recorded by the user, typed in or extracted from a receipt.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::{
    CategoryContext, DESCRIPTION_MAX_CHARS, MAX_AMOUNT, RECEIPT_DESCRIPTION_MAX_CHARS,
    TITLE_MAX_CHARS, truncate_chars,
};

use crate::types::RelationalInsert;
use crate::unify::pack_description;
use crate::upload::ReceiptExtraction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntrySource {
    Manual,
    Receipt { confidence: Option<f64> },
}

/// A validated expense ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub amount: Decimal,
    pub title: String,
    pub description: String,
    /// Canonical category
    pub category: String,
    pub date: NaiveDate,
    pub source: EntrySource,
}

impl NewExpense {
    /// Build a manual entry. The category is normalized against the
    /// session's set and is always canonical.
    pub fn manual(
        amount: Decimal,
        title: &str,
        description: &str,
        category: &str,
        date: NaiveDate,
        categories: &mut CategoryContext<'_>,
    ) -> Result<Self> {
        if amount.is_sign_negative() || amount.is_zero() {
            bail!("amount must be greater than zero (got {amount})");
        }
        if amount > MAX_AMOUNT {
            bail!("amount {amount} is larger than {MAX_AMOUNT}; check the value and try again");
        }
        let (title, description) = (title.trim(), description.trim());
        if title.is_empty() && description.is_empty() {
            bail!("give the expense a title or a description");
        }
        let (title, description) = if title.is_empty() {
            (description, "")
        } else {
            (title, description)
        };

        Ok(Self {
            amount,
            title: truncate_chars(title, TITLE_MAX_CHARS),
            description: truncate_chars(description, DESCRIPTION_MAX_CHARS),
            category: categories.normalize_category(category),
            date,
            source: EntrySource::Manual,
        })
    }

    /// Build an entry from a validated receipt extraction.
    pub fn from_receipt(
        receipt: ReceiptExtraction,
        date: NaiveDate,
        categories: &mut CategoryContext<'_>,
    ) -> Self {
        Self {
            amount: receipt.amount,
            title: truncate_chars(&receipt.title, TITLE_MAX_CHARS),
            description: truncate_chars(&receipt.description, RECEIPT_DESCRIPTION_MAX_CHARS),
            category: categories.normalize_category(&receipt.category),
            date,
            source: EntrySource::Receipt {
                confidence: receipt.confidence,
            },
        }
    }

    /// Row for the relational store. Receipt descriptions are cut to the
    /// stored cap here.
    pub fn to_insert(&self) -> RelationalInsert {
        let description = truncate_chars(&self.description, DESCRIPTION_MAX_CHARS);
        RelationalInsert {
            amount: self.amount,
            description: pack_description(&self.title, &description),
            category: self.category.clone(),
            expense_date: self.date,
        }
    }
}

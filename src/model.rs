//! Data model: persisted transactions and pipeline receipt candidates.
//!
//! A [`Transaction`] carries the fields shared by every entry plus a
//! [`TransactionKind`] holding only what is valid for that kind. Spend-only
//! fields such as `items` cannot exist on an income entry, and every match on
//! the kind is exhaustive.
//!
//! Amounts are always stored as non-negative magnitudes. The sign is derived
//! from the kind when displaying or aggregating (see [`Transaction::signed_amount`]).
//!
//! ## Wire format
//!
//! Serialises to the flat, tagged record used by the JSON file store:
//!
//! ```json
//! {
//!   "id": "5f0c…",
//!   "type": "SPEND",
//!   "description": "Cafe",
//!   "totalAmount": 12.5,
//!   "timestamp": "2024-05-01T09:30:00",
//!   "addressLocation": "1 Main St",
//!   "phoneNumberOfMerchant": "",
//!   "items": { "Coffee": 4.0 }
//! }
//! ```

use crate::error::ItemAnomaly;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Line items of a spend: item name → price.
pub type Items = BTreeMap<String, f64>;

/// A single income or expense entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Opaque unique identifier, generated at creation and never changed.
    pub id: String,
    pub description: String,
    /// Non-negative magnitude; see [`Transaction::signed_amount`].
    pub total_amount: f64,
    /// Local wall-clock time of the transaction.
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

/// The variant-specific part of a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Money going out, usually backed by a receipt.
    #[serde(rename_all = "camelCase")]
    Spend {
        #[serde(default)]
        address_location: String,
        #[serde(default)]
        phone_number_of_merchant: String,
        #[serde(default)]
        items: Items,
    },
    /// Money coming in.
    Income,
}

impl Transaction {
    /// Create a spend with a fresh id.
    pub fn spend(
        description: impl Into<String>,
        total_amount: f64,
        address_location: impl Into<String>,
        phone_number_of_merchant: impl Into<String>,
        timestamp: NaiveDateTime,
        items: Items,
    ) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            total_amount: total_amount.abs(),
            timestamp,
            kind: TransactionKind::Spend {
                address_location: address_location.into(),
                phone_number_of_merchant: phone_number_of_merchant.into(),
                items,
            },
        }
    }

    /// Create an income with a fresh id.
    pub fn income(description: impl Into<String>, total_amount: f64, timestamp: NaiveDateTime) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            total_amount: total_amount.abs(),
            timestamp,
            kind: TransactionKind::Income,
        }
    }

    pub fn is_spend(&self) -> bool {
        matches!(self.kind, TransactionKind::Spend { .. })
    }

    /// Amount with its accounting sign: negative for spends, positive for income.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Spend { .. } => -self.total_amount,
            TransactionKind::Income => self.total_amount,
        }
    }

    /// The same transaction under a different id. Edits use this to keep the
    /// stored id when every other field is replaced.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Line items, empty for income.
    pub fn items(&self) -> Option<&Items> {
        match &self.kind {
            TransactionKind::Spend { items, .. } => Some(items),
            TransactionKind::Income => None,
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A receipt parsed from the model's answer, not yet persisted.
///
/// Produced by [`crate::pipeline::parse::parse_receipt`]. Call
/// [`ReceiptCandidate::into_transaction`] once the caller accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptCandidate {
    /// Never blank: a missing description becomes `"Untitled Receipt"`.
    pub description: String,
    /// `0.0` when the model did not report a total but did report a description.
    pub total_amount: f64,
    pub address_location: String,
    pub phone_number_of_merchant: String,
    pub timestamp: NaiveDateTime,
    /// `false` when `timestamp` is the current time because the model's value
    /// was missing or unparseable.
    pub timestamp_parsed: bool,
    pub items: Items,
    /// Recovered field and item problems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<ItemAnomaly>,
}

impl ReceiptCandidate {
    /// Turn the candidate into a spend transaction with a fresh id.
    pub fn into_transaction(self) -> Transaction {
        Transaction::spend(
            self.description,
            self.total_amount,
            self.address_location,
            self.phone_number_of_merchant,
            self.timestamp,
            self.items,
        )
    }
}

/// Current local wall-clock time, the default for unknown timestamps.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn ids_are_unique() {
        let a = Transaction::income("Salary", 100.0, at(9, 0));
        let b = Transaction::income("Salary", 100.0, at(9, 0));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn amounts_are_stored_as_magnitudes() {
        let t = Transaction::spend("Cafe", -12.5, "", "", at(9, 0), Items::new());
        assert_eq!(t.total_amount, 12.5);
        assert_eq!(t.signed_amount(), -12.5);

        let i = Transaction::income("Gift", 20.0, at(9, 0));
        assert_eq!(i.signed_amount(), 20.0);
        assert!(!i.is_spend());
        assert!(i.items().is_none());
    }

    #[test]
    fn spend_serialises_as_tagged_record() {
        let mut items = Items::new();
        items.insert("Coffee".into(), 4.0);
        let t = Transaction::spend("Cafe", 12.5, "1 Main St", "+1", at(9, 30), items).with_id("abc");
        let v = serde_json::to_value(&t).unwrap();

        assert_eq!(v["id"], "abc");
        assert_eq!(v["type"], "SPEND");
        assert_eq!(v["totalAmount"], 12.5);
        assert_eq!(v["addressLocation"], "1 Main St");
        assert_eq!(v["phoneNumberOfMerchant"], "+1");
        assert_eq!(v["timestamp"], "2024-05-01T09:30:00");
        assert_eq!(v["items"]["Coffee"], 4.0);
    }

    #[test]
    fn income_has_no_spend_fields() {
        let t = Transaction::income("Salary", 2500.0, at(10, 0)).with_id("x");
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["type"], "INCOME");
        assert!(v.get("items").is_none());
        assert!(v.get("addressLocation").is_none());

        let back: Transaction = serde_json::from_value(v).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn spend_record_tolerates_missing_optional_fields() {
        let raw = r#"{"id":"1","type":"SPEND","description":"Shop","totalAmount":3.0,"timestamp":"2024-05-01T08:00:00"}"#;
        let t: Transaction = serde_json::from_str(raw).unwrap();
        match t.kind {
            TransactionKind::Spend {
                address_location,
                phone_number_of_merchant,
                items,
            } => {
                assert!(address_location.is_empty());
                assert!(phone_number_of_merchant.is_empty());
                assert!(items.is_empty());
            }
            TransactionKind::Income => panic!("expected spend"),
        }
    }

    #[test]
    fn candidate_becomes_spend() {
        let c = ReceiptCandidate {
            description: "Cafe".into(),
            total_amount: 12.5,
            address_location: String::new(),
            phone_number_of_merchant: String::new(),
            timestamp: at(9, 0),
            timestamp_parsed: true,
            items: Items::new(),
            anomalies: vec![],
        };
        let t = c.into_transaction();
        assert!(t.is_spend());
        assert_eq!(t.description, "Cafe");
        assert!(!t.id.is_empty());
    }
}

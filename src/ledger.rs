//! Ledger helpers over a list of transactions: search, totals, manual entry
//! validation and amount formatting.
//!
//! Everything here is pure and takes `now` explicitly where time matters, so
//! callers (and tests) control the clock.

use crate::model::{Items, Transaction, TransactionKind};
use chrono::{Datelike, Duration, NaiveDateTime};
use num_format::{Locale, ToFormattedString as _};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Currency symbol used when none is given.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "$";

// ── Formatting ───────────────────────────────────────────────────────────────

/// Format `amount` as `-$1,234.50`: symbol, thousands separators, two
/// decimals, leading minus for negatives.
pub fn format_amount(amount: f64, symbol: &str) -> String {
    let cents = (amount.abs() * 100.0).round() as i64;
    let sign = if amount < 0.0 && cents != 0 { "-" } else { "" };
    format!(
        "{sign}{symbol}{}.{:02}",
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}

/// Lower-cased text a search query is matched against.
///
/// Holds the description, amount, timestamp (`dd Month yyyy HH:MM`) and, for
/// spends, the address, phone and every item with its price.
pub fn searchable_text(transaction: &Transaction) -> String {
    let mut parts = vec![
        transaction.description.clone(),
        format_amount(transaction.total_amount, DEFAULT_CURRENCY_SYMBOL),
        transaction.timestamp.format("%d %B %Y %H:%M").to_string(),
    ];
    if let TransactionKind::Spend {
        address_location,
        phone_number_of_merchant,
        items,
    } = &transaction.kind
    {
        parts.push(address_location.clone());
        parts.push(phone_number_of_merchant.clone());
        for (name, price) in items {
            parts.push(name.clone());
            parts.push(format_amount(*price, DEFAULT_CURRENCY_SYMBOL));
        }
    }
    parts.join(" ").to_lowercase()
}

// ── Search & ordering ────────────────────────────────────────────────────────

/// Transactions whose searchable text contains `query`, case-insensitively.
/// A blank query matches everything.
pub fn search<'a>(transactions: &'a [Transaction], query: &str) -> Vec<&'a Transaction> {
    let needle = query.trim().to_lowercase();
    transactions
        .iter()
        .filter(|t| needle.is_empty() || searchable_text(t).contains(&needle))
        .collect()
}

pub fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

// ── Totals ───────────────────────────────────────────────────────────────────

/// Net of transactions in the same calendar month and year as `now`.
pub fn month_total(transactions: &[Transaction], now: NaiveDateTime) -> f64 {
    transactions
        .iter()
        .filter(|t| t.timestamp.year() == now.year() && t.timestamp.month() == now.month())
        .map(Transaction::signed_amount)
        .sum()
}

/// Net of transactions strictly after `now - 7 days`.
pub fn week_total(transactions: &[Transaction], now: NaiveDateTime) -> f64 {
    let since = now - Duration::weeks(1);
    transactions
        .iter()
        .filter(|t| t.timestamp > since)
        .map(Transaction::signed_amount)
        .sum()
}

/// Signed week and month totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub week: f64,
    pub month: f64,
}

pub fn totals(transactions: &[Transaction], now: NaiveDateTime) -> Totals {
    Totals {
        week: week_total(transactions, now),
        month: month_total(transactions, now),
    }
}

// ── Manual entry ─────────────────────────────────────────────────────────────

static RE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d*\.?\d*$").unwrap());

/// Why a manual entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("'{0}' is not a valid amount")]
    InvalidAmount(String),
}

/// A transaction typed in by hand, as raw form input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualEntry {
    pub is_spend: bool,
    pub description: String,
    pub amount: String,
    pub address_location: String,
    pub phone_number_of_merchant: String,
    pub items: Items,
}

impl ManualEntry {
    /// Check the entry and return the parsed amount.
    ///
    /// Spends need a description, amount, address and phone; income only a
    /// description and amount. The amount is digits with at most one dot.
    pub fn validate(&self) -> Result<f64, EntryError> {
        if self.description.trim().is_empty() {
            return Err(EntryError::MissingField("description"));
        }
        let amount = self.amount.trim();
        if amount.is_empty() {
            return Err(EntryError::MissingField("amount"));
        }
        if self.is_spend {
            if self.address_location.trim().is_empty() {
                return Err(EntryError::MissingField("address"));
            }
            if self.phone_number_of_merchant.trim().is_empty() {
                return Err(EntryError::MissingField("phone number"));
            }
        }
        if !RE_AMOUNT.is_match(amount) {
            return Err(EntryError::InvalidAmount(amount.to_string()));
        }
        amount
            .parse::<f64>()
            .map_err(|_| EntryError::InvalidAmount(amount.to_string()))
    }

    /// Validate and build a transaction with a fresh id.
    pub fn into_transaction(self, timestamp: NaiveDateTime) -> Result<Transaction, EntryError> {
        let amount = self.validate()?;
        Ok(if self.is_spend {
            Transaction::spend(
                self.description,
                amount,
                self.address_location,
                self.phone_number_of_merchant,
                timestamp,
                self.items,
            )
        } else {
            Transaction::income(self.description, amount, timestamp)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn spend(desc: &str, amount: f64, at: NaiveDateTime) -> Transaction {
        let mut items = Items::new();
        items.insert("Espresso".into(), 3.5);
        Transaction::spend(desc, amount, "1 Main St", "+15551234", at, items)
    }

    #[test]
    fn formats_amounts() {
        assert_eq!(format_amount(1234.5, "$"), "$1,234.50");
        assert_eq!(format_amount(-25000.0, "$"), "-$25,000.00");
        assert_eq!(format_amount(0.0, "€"), "€0.00");
        assert_eq!(format_amount(0.004, "$"), "$0.00");
        assert_eq!(format_amount(-0.001, "$"), "$0.00");
        assert_eq!(format_amount(1299.999, "$"), "$1,300.00");
    }

    #[test]
    fn searchable_text_covers_spend_fields() {
        let t = spend("Corner Cafe", 12.5, ts(2024, 3, 5, 9));
        let text = searchable_text(&t);
        assert!(text.starts_with("corner cafe $12.50 05 march 2024 09:00"));
        assert!(text.contains("1 main st"));
        assert!(text.contains("+15551234"));
        assert!(text.contains("espresso $3.50"));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let list = vec![
            spend("Corner Cafe", 12.5, ts(2024, 3, 5, 9)),
            Transaction::income("Salary", 100.0, ts(2024, 3, 1, 9)),
        ];
        assert_eq!(search(&list, "CAFE").len(), 1);
        assert_eq!(search(&list, "espresso").len(), 1);
        assert_eq!(search(&list, "march 2024").len(), 2);
        assert_eq!(search(&list, "  ").len(), 2);
        assert!(search(&list, "pizza").is_empty());
    }

    #[test]
    fn sorts_newest_first() {
        let mut list = vec![
            Transaction::income("a", 1.0, ts(2024, 1, 1, 0)),
            Transaction::income("c", 1.0, ts(2024, 3, 1, 0)),
            Transaction::income("b", 1.0, ts(2024, 2, 1, 0)),
        ];
        sort_newest_first(&mut list);
        let order: Vec<_> = list.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, ["c", "b", "a"]);
    }

    #[test]
    fn month_and_week_totals() {
        let now = ts(2024, 6, 15, 12);
        let list = vec![
            spend("Cafe", 10.0, ts(2024, 6, 14, 9)),
            Transaction::income("Salary", 100.0, ts(2024, 6, 1, 9)),
            spend("Old", 50.0, ts(2024, 5, 31, 9)),
            spend("Last year", 7.0, ts(2023, 6, 10, 9)),
        ];
        assert_eq!(month_total(&list, now), 90.0);
        assert_eq!(week_total(&list, now), -10.0);
        assert_eq!(totals(&list, now), Totals { week: -10.0, month: 90.0 });
    }

    #[test]
    fn week_boundary_is_exclusive() {
        let now = ts(2024, 6, 15, 12);
        let list = vec![Transaction::income("edge", 5.0, ts(2024, 6, 8, 12))];
        assert_eq!(week_total(&list, now), 0.0);
    }

    #[test]
    fn validates_spend_entries() {
        let mut entry = ManualEntry {
            is_spend: true,
            description: "Cafe".into(),
            amount: "12.50".into(),
            address_location: "1 Main St".into(),
            phone_number_of_merchant: "+1".into(),
            items: Items::new(),
        };
        assert_eq!(entry.validate(), Ok(12.5));

        entry.phone_number_of_merchant = " ".into();
        assert_eq!(entry.validate(), Err(EntryError::MissingField("phone number")));

        entry.phone_number_of_merchant = "+1".into();
        entry.amount = "-5".into();
        assert_eq!(entry.validate(), Err(EntryError::InvalidAmount("-5".into())));

        entry.amount = "1.2.3".into();
        assert!(entry.validate().is_err());
        entry.amount = ".".into();
        assert!(entry.validate().is_err());
    }

    #[test]
    fn income_needs_only_description_and_amount() {
        let entry = ManualEntry {
            is_spend: false,
            description: "Gift".into(),
            amount: "20".into(),
            ..Default::default()
        };
        let t = entry.into_transaction(ts(2024, 6, 1, 9)).unwrap();
        assert!(!t.is_spend());
        assert_eq!(t.total_amount, 20.0);

        let empty = ManualEntry::default();
        assert_eq!(empty.validate(), Err(EntryError::MissingField("description")));
    }
}

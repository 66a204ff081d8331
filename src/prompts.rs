//! Prompt sent to the vision model alongside the receipt image.
//!
//! Kept in one place so both provider payloads embed exactly the same text,
//! and so tests can inspect it without a network call. Callers can override
//! it via [`crate::config::ExtractionConfig::prompt`].
//!
//! Note the timestamp format requested here (`DD/MM/YYYY`) differs from the
//! one [`crate::pipeline::parse`] accepts (`MM/DD/YYYY`). Both are kept as-is
//! until product decides which one is right; see `DESIGN.md`.

/// Default extraction prompt.
pub const RECEIPT_EXTRACTION_PROMPT: &str = "Extract data from this receipt and return only JSON with keys: \
description (2-3 word merchant/category summary), \
totalAmount (integer grand total), \
addressLocation, \
phoneNumberOfMerchant, \
timestamp (format DD/MM/YYYY HH:MM:SS), \
items (list of single-key objects mapping item name to integer cost). \
Leave a field empty if unavailable; never fabricate values. \
If no receipt is present, return all keys with empty values. \
Output must be raw JSON only — no prose, no markdown fencing.";

/// Keys the model is asked to return, in prompt order.
pub const RECEIPT_KEYS: [&str; 6] = [
    "description",
    "totalAmount",
    "addressLocation",
    "phoneNumberOfMerchant",
    "timestamp",
    "items",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_key() {
        for key in RECEIPT_KEYS {
            assert!(RECEIPT_EXTRACTION_PROMPT.contains(key), "missing {key}");
        }
    }

    #[test]
    fn prompt_forbids_fabrication_and_fences() {
        assert!(RECEIPT_EXTRACTION_PROMPT.contains("never fabricate values"));
        assert!(RECEIPT_EXTRACTION_PROMPT.contains("no markdown fencing"));
        assert!(RECEIPT_EXTRACTION_PROMPT.starts_with("Extract data from this receipt"));
        assert!(!RECEIPT_EXTRACTION_PROMPT.contains("  "));
    }
}

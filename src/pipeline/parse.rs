//! Receipt parsing: assistant text → [`ReceiptCandidate`].
//!
//! The model is asked for raw JSON but is not trusted to deliver it. This
//! module decodes into a [`serde_json::Value`] and then reads every field on
//! its own, so one bad field never costs the others:
//!
//! | Input problem                         | Result                              |
//! |---------------------------------------|-------------------------------------|
//! | text wrapped in a ```` ``` ```` fence | fence stripped                      |
//! | not JSON / not an object              | [`ReceiptError::UnparseableReceipt`] |
//! | field of the wrong type               | treated as absent + anomaly         |
//! | item not an object / empty object     | item skipped + anomaly              |
//! | item with several keys                | first key kept + anomaly            |
//! | non-numeric price                     | `0.0` + anomaly                     |
//! | timestamp not `MM/DD/YYYY HH:MM:SS`   | current time + anomaly              |
//!
//! A blank description together with a missing total means the model found
//! no receipt, reported as [`ParseOutcome::NoReceipt`] rather than an error.

use crate::error::{ItemAnomaly, ReceiptError};
use crate::model::{self, Items, ReceiptCandidate};
use crate::pipeline::response::type_name;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Pattern the `timestamp` field is parsed with.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Description used when the model returns a total but no description.
pub const UNTITLED_RECEIPT: &str = "Untitled Receipt";

/// What the model's answer amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// A receipt was found (possibly with recovered anomalies).
    Receipt(ReceiptCandidate),
    /// Well-formed answer with no receipt content.
    NoReceipt,
}

/// Parse the assistant text, using the current local time as the timestamp
/// fallback.
pub fn parse_receipt(text: &str) -> Result<ParseOutcome, ReceiptError> {
    parse_receipt_at(text, model::now())
}

/// Parse the assistant text with an explicit fallback time.
pub fn parse_receipt_at(text: &str, now: NaiveDateTime) -> Result<ParseOutcome, ReceiptError> {
    let json = strip_code_fence(text);
    let value: Value = serde_json::from_str(json).map_err(|e| ReceiptError::UnparseableReceipt {
        detail: e.to_string(),
    })?;
    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(ReceiptError::UnparseableReceipt {
                detail: format!("expected a JSON object, got {}", type_name(&other)),
            })
        }
    };

    let mut anomalies = Vec::new();

    let description = string_field(&obj, "description", &mut anomalies);
    let total_amount = amount_field(&obj, &mut anomalies);

    let description_blank = description.as_deref().map_or(true, |d| d.trim().is_empty());
    if description_blank && total_amount.is_none() {
        debug!("No receipt content in model answer");
        return Ok(ParseOutcome::NoReceipt);
    }

    let address_location = string_field(&obj, "addressLocation", &mut anomalies).unwrap_or_default();
    let phone_number_of_merchant =
        string_field(&obj, "phoneNumberOfMerchant", &mut anomalies).unwrap_or_default();
    let (timestamp, timestamp_parsed) = timestamp_field(&obj, now, &mut anomalies);
    let items = items_field(&obj, &mut anomalies);

    let description = match description {
        Some(d) if !d.trim().is_empty() => d,
        _ => UNTITLED_RECEIPT.to_string(),
    };

    if !anomalies.is_empty() {
        warn!("Recovered {} anomalies while parsing receipt", anomalies.len());
        for a in &anomalies {
            debug!("  {}", a);
        }
    }

    Ok(ParseOutcome::Receipt(ReceiptCandidate {
        description,
        total_amount: total_amount.unwrap_or(0.0).abs(),
        address_location,
        phone_number_of_merchant,
        timestamp,
        timestamp_parsed,
        items,
        anomalies,
    }))
}

// ── Fence stripping ──────────────────────────────────────────────────────────

static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").unwrap());
static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```$").unwrap());

/// Remove surrounding whitespace and an optional markdown code fence.
///
/// The opening and closing fences are stripped independently, so an answer
/// cut off before its closing fence still yields the JSON inside.
pub fn strip_code_fence(text: &str) -> &str {
    let mut inner = text.trim();
    if let Some(m) = RE_FENCE_OPEN.find(inner) {
        inner = &inner[m.end()..];
    }
    if let Some(m) = RE_FENCE_CLOSE.find(inner) {
        inner = &inner[..m.start()];
    }
    inner.trim()
}

// ── Scalar fields ────────────────────────────────────────────────────────────

/// A string field; numbers are accepted and stringified. Null means absent.
fn string_field(obj: &Map<String, Value>, field: &str, anomalies: &mut Vec<ItemAnomaly>) -> Option<String> {
    match obj.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => {
            anomalies.push(ItemAnomaly::FieldIgnored {
                field: field.to_string(),
                found: type_name(other).to_string(),
            });
            None
        }
    }
}

fn amount_field(obj: &Map<String, Value>, anomalies: &mut Vec<ItemAnomaly>) -> Option<f64> {
    let value = obj.get("totalAmount")?;
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        _ => match numeric(value) {
            Some(n) => Some(n),
            None => {
                anomalies.push(ItemAnomaly::FieldIgnored {
                    field: "totalAmount".to_string(),
                    found: describe(value),
                });
                None
            }
        },
    }
}

fn timestamp_field(
    obj: &Map<String, Value>,
    now: NaiveDateTime,
    anomalies: &mut Vec<ItemAnomaly>,
) -> (NaiveDateTime, bool) {
    let Some(raw) = string_field(obj, "timestamp", anomalies) else {
        return (now, false);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return (now, false);
    }
    match NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        Ok(ts) => (ts, true),
        Err(_) => {
            anomalies.push(ItemAnomaly::TimestampFallback { raw: raw.to_string() });
            (now, false)
        }
    }
}

// ── Items ────────────────────────────────────────────────────────────────────

fn items_field(obj: &Map<String, Value>, anomalies: &mut Vec<ItemAnomaly>) -> Items {
    let mut items = Items::new();
    let entries = match obj.get("items") {
        None | Some(Value::Null) => return items,
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            anomalies.push(ItemAnomaly::ItemsNotArray {
                found: type_name(other).to_string(),
            });
            return items;
        }
    };

    for (index, entry) in entries.iter().enumerate() {
        let Value::Object(map) = entry else {
            anomalies.push(ItemAnomaly::NotAnObject {
                index,
                found: type_name(entry).to_string(),
            });
            continue;
        };
        // Object keys keep document order, so "first" is the first written.
        let Some((name, price)) = map.iter().next() else {
            anomalies.push(ItemAnomaly::EmptyObject { index });
            continue;
        };
        if map.len() > 1 {
            anomalies.push(ItemAnomaly::ExtraKeys {
                index,
                extra: map.len() - 1,
            });
        }
        let price = numeric(price).unwrap_or_else(|| {
            anomalies.push(ItemAnomaly::NonNumericPrice {
                name: name.clone(),
                found: describe(price),
            });
            0.0
        });
        items.insert(name.clone(), price);
    }
    items
}

/// A JSON number or a string holding one.
fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => type_name(other).to_string(),
    }
}

//! Error types for the receipt-scanner library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ReceiptError`] — **Fatal** to one extraction attempt: the image could
//!   not be read, the provider refused the call, or the model's answer was not
//!   JSON at all. The `Display` text is the short message shown to the user.
//!
//! * [`ItemAnomaly`] — **Non-fatal**: one field or one line item of the
//!   model's answer was malformed. The rest of the receipt is still usable,
//!   so the anomaly is recorded on [`crate::model::ReceiptCandidate`] instead
//!   of aborting the whole parse.
//!
//! * [`StoreError`] — failures of the transaction and API-key stores, which
//!   live outside the extraction pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors of a single receipt-extraction attempt.
///
/// None of these are retried by the library. The orchestrator in
/// [`crate::extract`] catches every variant and turns it into an
/// [`crate::extract::ExtractionOutcome::Failed`] carrying `to_string()`.
#[derive(Debug, Error)]
pub enum ReceiptError {
    // ── Precondition errors ───────────────────────────────────────────────
    /// No API key has been configured.
    #[error("Please set your API key in settings")]
    MissingApiKey,

    // ── Image errors ──────────────────────────────────────────────────────
    /// The image could not be opened or decoded.
    #[error("{}", unreadable_message(.cause, .detail))]
    ImageUnreadable {
        path: Option<PathBuf>,
        cause: UnreadableCause,
        detail: String,
    },

    /// Decoding the image would exceed the configured memory budget.
    #[error("Image is too large to process")]
    ImageTooLarge { detail: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// Connection failure, DNS failure or timeout.
    #[error("Network error: {detail}")]
    NetworkError { detail: String },

    /// The provider answered with a non-2xx status.
    #[error("API call failed: {status} {reason}")]
    ProviderHttpError {
        status: u16,
        reason: String,
        body: Option<String>,
    },

    /// The provider answered 2xx with an empty body.
    #[error("Empty response from provider")]
    EmptyResponse,

    // ── Response errors ───────────────────────────────────────────────────
    /// The provider envelope did not have the expected shape.
    #[error("Unexpected response format from provider: {detail}")]
    MalformedProviderResponse { detail: String },

    /// The assistant text was not a JSON object.
    #[error("Error parsing receipt: {detail}")]
    UnparseableReceipt { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (e.g. a panicked blocking task).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an image source could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadableCause {
    NotFound,
    PermissionDenied,
    Corrupt,
}

fn unreadable_message(cause: &UnreadableCause, detail: &str) -> String {
    match cause {
        UnreadableCause::NotFound => "Image file not found".to_string(),
        UnreadableCause::PermissionDenied => "Permission denied to access image".to_string(),
        UnreadableCause::Corrupt => format!("Could not read image: {detail}"),
    }
}

/// Field-less discriminant of [`ReceiptError`], handy for matching in
/// callers and tests without caring about the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingApiKey,
    ImageUnreadable,
    ImageTooLarge,
    NetworkError,
    ProviderHttpError,
    EmptyResponse,
    MalformedProviderResponse,
    UnparseableReceipt,
    InvalidConfig,
    Internal,
}

impl ReceiptError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReceiptError::MissingApiKey => ErrorKind::MissingApiKey,
            ReceiptError::ImageUnreadable { .. } => ErrorKind::ImageUnreadable,
            ReceiptError::ImageTooLarge { .. } => ErrorKind::ImageTooLarge,
            ReceiptError::NetworkError { .. } => ErrorKind::NetworkError,
            ReceiptError::ProviderHttpError { .. } => ErrorKind::ProviderHttpError,
            ReceiptError::EmptyResponse => ErrorKind::EmptyResponse,
            ReceiptError::MalformedProviderResponse { .. } => ErrorKind::MalformedProviderResponse,
            ReceiptError::UnparseableReceipt { .. } => ErrorKind::UnparseableReceipt,
            ReceiptError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ReceiptError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code, if this is a provider HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReceiptError::ProviderHttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A non-fatal problem found while parsing the model's answer.
///
/// Stored on [`crate::model::ReceiptCandidate::anomalies`]. The offending
/// entry is skipped (or the field treated as absent); everything else in the
/// receipt is kept.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemAnomaly {
    /// An `items` entry was not a JSON object.
    #[error("item {index}: expected an object, got {found}")]
    NotAnObject { index: usize, found: String },

    /// An `items` entry was an object without any key.
    #[error("item {index}: empty object")]
    EmptyObject { index: usize },

    /// An `items` entry had more than one key; only the first was kept.
    #[error("item {index}: {extra} extra key(s) ignored")]
    ExtraKeys { index: usize, extra: usize },

    /// An item price was present but not numeric; `0.0` was used.
    #[error("item '{name}': price {found} is not numeric, using 0")]
    NonNumericPrice { name: String, found: String },

    /// `items` itself was not an array.
    #[error("items: expected an array, got {found}")]
    ItemsNotArray { found: String },

    /// A top-level field had an unusable type and was treated as absent.
    #[error("field '{field}': unexpected {found}, ignored")]
    FieldIgnored { field: String, found: String },

    /// The timestamp did not match the expected pattern; the current time was used.
    #[error("timestamp '{raw}' not in MM/DD/YYYY HH:MM:SS, using current time")]
    TimestampFallback { raw: String },
}

/// Failures of the transaction and API-key stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialising the transaction list failed.
    #[error("Failed to serialise transactions: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No transaction with this id exists.
    #[error("Transaction '{id}' not found")]
    NotFound { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_http_error_display() {
        let e = ReceiptError::ProviderHttpError {
            status: 429,
            reason: "Too Many Requests".into(),
            body: Some("{\"error\":\"rate_limit\"}".into()),
        };
        assert_eq!(e.to_string(), "API call failed: 429 Too Many Requests");
        assert_eq!(e.status(), Some(429));
        assert_eq!(e.kind(), ErrorKind::ProviderHttpError);
    }

    #[test]
    fn unreadable_messages_depend_on_cause() {
        let missing = ReceiptError::ImageUnreadable {
            path: Some("/tmp/nope.jpg".into()),
            cause: UnreadableCause::NotFound,
            detail: "No such file".into(),
        };
        assert_eq!(missing.to_string(), "Image file not found");

        let denied = ReceiptError::ImageUnreadable {
            path: None,
            cause: UnreadableCause::PermissionDenied,
            detail: String::new(),
        };
        assert_eq!(denied.to_string(), "Permission denied to access image");

        let corrupt = ReceiptError::ImageUnreadable {
            path: None,
            cause: UnreadableCause::Corrupt,
            detail: "bad magic".into(),
        };
        assert!(corrupt.to_string().contains("bad magic"));
    }

    #[test]
    fn missing_key_display() {
        let e = ReceiptError::MissingApiKey;
        assert!(e.to_string().contains("API key"));
        assert_eq!(e.status(), None);
    }

    #[test]
    fn anomaly_display() {
        let a = ItemAnomaly::EmptyObject { index: 2 };
        assert_eq!(a.to_string(), "item 2: empty object");
    }

    #[test]
    fn store_not_found_display() {
        let e = StoreError::NotFound { id: "abc".into() };
        assert!(e.to_string().contains("abc"));
    }
}

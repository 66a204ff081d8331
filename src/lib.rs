//! # receipt-scanner
//!
//! Turn a photo of a receipt into a structured spend transaction using a
//! vision LLM, and keep a small ledger of income and expenses.
//!
//! ## Why this crate?
//!
//! Receipts come in every layout imaginable, and classic OCR plus regexes
//! breaks on most of them. Instead the photo is shrunk to a provider-friendly
//! JPEG and sent to a vision model with a prompt asking for a fixed JSON
//! shape. The model's answer is then parsed defensively: a truncated item
//! list, a stray markdown fence or a nonsense timestamp cost only the broken
//! piece, never the whole receipt.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo
//!  │
//!  ├─ 1. Preprocess  decode, fit into 1024×1024, JPEG q80, base64 (spawn_blocking)
//!  ├─ 2. Request     sk-ant… key → Anthropic, any other key → OpenAI
//!  ├─ 3. Transport   one HTTPS POST, no retry
//!  ├─ 4. Response    provider envelope → assistant text
//!  └─ 5. Parse       fault-isolated JSON decode → ReceiptCandidate
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use receipt_scanner::{extract_receipt, ExtractionConfig, ExtractionOutcome};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ExtractionConfig::default();
//!     let key = std::env::var("RECEIPT_SCANNER_API_KEY").unwrap_or_default();
//!     match extract_receipt(std::path::Path::new("receipt.jpg"), &key, &config).await {
//!         ExtractionOutcome::Success(receipt) => {
//!             println!("{}: {:.2}", receipt.description, receipt.total_amount)
//!         }
//!         other => eprintln!("{}", other.message().unwrap_or_default()),
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `receipt-scan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! receipt-scanner = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod keystore;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ErrorKind, ItemAnomaly, ReceiptError, StoreError, UnreadableCause};
pub use extract::{extract_receipt, extract_receipt_sync, ExtractionOutcome, ReceiptExtractor, NO_RECEIPT_MESSAGE};
pub use keystore::{ApiKeyStore, FileKeyStore, MemoryKeyStore};
pub use ledger::{format_amount, ManualEntry, Totals};
pub use model::{Items, ReceiptCandidate, Transaction, TransactionKind};
pub use pipeline::preprocess::ImageSource;
pub use pipeline::request::{HttpRequestSpec, Provider};
pub use pipeline::transport::{HttpTransport, Transport};
pub use progress::{ExtractionProgressCallback, ExtractionStage, NoopProgressCallback, ProgressCallback};
pub use store::{JsonFileStore, MemoryStore, TransactionStore};

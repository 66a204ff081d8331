//! Extraction entry points: one photo in, one display-ready outcome out.
//!
//! [`ReceiptExtractor`] drives the stages in [`crate::pipeline`] strictly in
//! order and reports progress after each. It never returns an error: every
//! [`ReceiptError`] is caught here and turned into
//! [`ExtractionOutcome::Failed`] with the short message the user should see.
//! Nothing is persisted; saving an accepted candidate is up to the caller.

use crate::config::ExtractionConfig;
use crate::error::{ErrorKind, ReceiptError};
use crate::model::ReceiptCandidate;
use crate::pipeline::parse::{self, ParseOutcome};
use crate::pipeline::preprocess::{self, ImageSource};
use crate::pipeline::request;
use crate::pipeline::response;
use crate::pipeline::transport::{HttpTransport, Transport};
use crate::progress::{ExtractionStage, ProgressReporter};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shown when the model answered but found nothing that looks like a receipt.
pub const NO_RECEIPT_MESSAGE: &str = "Couldn't get receipt from provided image";

/// Final result of one extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// A receipt was read. May carry recovered anomalies.
    Success(ReceiptCandidate),
    /// The model answered, but with no receipt content.
    NoReceiptDetected { message: String },
    /// The attempt failed; `message` is ready for display.
    Failed { kind: ErrorKind, message: String },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success(_))
    }

    /// The candidate, if one was extracted.
    pub fn candidate(&self) -> Option<&ReceiptCandidate> {
        match self {
            ExtractionOutcome::Success(c) => Some(c),
            _ => None,
        }
    }

    /// User-facing message for the non-success outcomes.
    pub fn message(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Success(_) => None,
            ExtractionOutcome::NoReceiptDetected { message } | ExtractionOutcome::Failed { message, .. } => {
                Some(message)
            }
        }
    }
}

/// Runs the extraction pipeline against one transport.
///
/// Cheap to share: wrap in an `Arc` or clone it. The transport is used
/// read-only and concurrent extractions do not interact.
#[derive(Clone)]
pub struct ReceiptExtractor {
    config: ExtractionConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ReceiptExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptExtractor")
            .field("config", &self.config)
            .field("transport", &"<dyn Transport>")
            .finish()
    }
}

impl ReceiptExtractor {
    /// Extractor using the real HTTP transport.
    pub fn new(config: ExtractionConfig) -> Result<Self, ReceiptError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Extractor using a caller-supplied transport.
    pub fn with_transport(config: ExtractionConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract a receipt from `source` using `api_key`.
    ///
    /// The provider is chosen from the key. A blank key fails immediately
    /// with no network call. Progress resets to `0.0` on any failure.
    pub async fn extract(&self, source: impl Into<ImageSource>, api_key: &str) -> ExtractionOutcome {
        let start = Instant::now();
        let reporter = ProgressReporter::new(self.config.progress_callback.clone());

        match self.run(source.into(), api_key, &reporter).await {
            Ok(ParseOutcome::Receipt(candidate)) => {
                info!(
                    "Extracted '{}' ({} items) in {}ms",
                    candidate.description,
                    candidate.items.len(),
                    start.elapsed().as_millis()
                );
                ExtractionOutcome::Success(candidate)
            }
            Ok(ParseOutcome::NoReceipt) => {
                info!("No receipt detected ({}ms)", start.elapsed().as_millis());
                ExtractionOutcome::NoReceiptDetected {
                    message: NO_RECEIPT_MESSAGE.to_string(),
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Extraction failed: {}", message);
                if let ReceiptError::ProviderHttpError { body: Some(ref body), .. } = e {
                    debug!("Provider error body: {}", body);
                }
                reporter.fail(&message);
                ExtractionOutcome::Failed {
                    kind: e.kind(),
                    message,
                }
            }
        }
    }

    async fn run(
        &self,
        source: ImageSource,
        api_key: &str,
        reporter: &ProgressReporter,
    ) -> Result<ParseOutcome, ReceiptError> {
        // ── Step 1: Key check ────────────────────────────────────────────
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ReceiptError::MissingApiKey);
        }

        // ── Step 2: Preprocess image ─────────────────────────────────────
        reporter.stage(ExtractionStage::Preprocessing);
        let config = self.config.clone();
        let image = tokio::task::spawn_blocking(move || preprocess::compress(&source, &config))
            .await
            .map_err(|e| ReceiptError::Internal(format!("Preprocessing task panicked: {e}")))??;

        // ── Step 3: Select provider and build request ────────────────────
        reporter.stage(ExtractionStage::KeySelected);
        let request = request::build_request(&image, api_key, &self.config);
        info!("Sending {}x{} receipt image to {}", image.width, image.height, request.provider);
        drop(image);
        reporter.stage(ExtractionStage::RequestBuilt);

        // ── Step 4: Call provider ────────────────────────────────────────
        reporter.stage(ExtractionStage::AwaitingResponse);
        let body = self.transport.execute(&request).await?;
        reporter.stage(ExtractionStage::ResponseReceived);

        // ── Step 5: Decode envelope and receipt ──────────────────────────
        let text = response::extract_assistant_text(&body, request.provider)?;
        let outcome = parse::parse_receipt(&text)?;
        reporter.stage(ExtractionStage::Parsed);

        Ok(outcome)
    }
}

/// Extract a receipt with a one-off extractor over the HTTP transport.
pub async fn extract_receipt(
    source: impl Into<ImageSource>,
    api_key: &str,
    config: &ExtractionConfig,
) -> ExtractionOutcome {
    match ReceiptExtractor::new(config.clone()) {
        Ok(extractor) => extractor.extract(source, api_key).await,
        Err(e) => failed_before_start(e, config),
    }
}

/// Synchronous wrapper around [`extract_receipt`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_receipt_sync(
    source: impl Into<ImageSource>,
    api_key: &str,
    config: &ExtractionConfig,
) -> ExtractionOutcome {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(extract_receipt(source, api_key, config)),
        Err(e) => failed_before_start(
            ReceiptError::Internal(format!("Failed to create tokio runtime: {e}")),
            config,
        ),
    }
}

fn failed_before_start(e: ReceiptError, config: &ExtractionConfig) -> ExtractionOutcome {
    let message = e.to_string();
    ProgressReporter::new(config.progress_callback.clone()).fail(&message);
    ExtractionOutcome::Failed {
        kind: e.kind(),
        message,
    }
}

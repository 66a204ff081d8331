//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages.
//!
//! The pipeline is a fixed sequence, so progress is reported as a fraction
//! tied to each stage:
//!
//! ```text
//! Idle 0.0 → Preprocessing 0.1 → KeySelected 0.3 → RequestBuilt 0.3
//!          → AwaitingResponse 0.7 → ResponseReceived 0.9 → Parsed 1.0
//! ```
//!
//! Fractions reported within one extraction never decrease, except that any
//! failure resets progress to `0.0`.
//!
//! # Example
//!
//! ```rust
//! use receipt_scanner::{ExtractionConfig, ExtractionProgressCallback, ExtractionStage};
//! use std::sync::{Arc, Mutex};
//!
//! struct Recorder(Mutex<Vec<f32>>);
//!
//! impl ExtractionProgressCallback for Recorder {
//!     fn on_progress(&self, _stage: ExtractionStage, fraction: f32) {
//!         self.0.lock().unwrap().push(fraction);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Recorder(Mutex::new(Vec::new()))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::sync::Mutex;

/// A milestone of the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtractionStage {
    Idle,
    Preprocessing,
    KeySelected,
    RequestBuilt,
    AwaitingResponse,
    ResponseReceived,
    Parsed,
}

impl ExtractionStage {
    /// Progress fraction reported when this stage is reached.
    pub fn fraction(self) -> f32 {
        match self {
            ExtractionStage::Idle => 0.0,
            ExtractionStage::Preprocessing => 0.1,
            ExtractionStage::KeySelected | ExtractionStage::RequestBuilt => 0.3,
            ExtractionStage::AwaitingResponse => 0.7,
            ExtractionStage::ResponseReceived => 0.9,
            ExtractionStage::Parsed => 1.0,
        }
    }
}

/// Called by the extraction pipeline as it advances.
///
/// Implementations must be `Send + Sync`: the pipeline runs on the Tokio
/// runtime and may report from whichever worker thread polls it. All methods
/// have default no-op implementations so callers only override what they
/// care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called at each stage with a fraction in `[0, 1]`.
    fn on_progress(&self, stage: ExtractionStage, fraction: f32) {
        let _ = (stage, fraction);
    }

    /// Called once when an attempt fails, after progress was reset to `0.0`.
    ///
    /// # Arguments
    /// * `message` — the user-facing failure message
    fn on_failure(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

/// Per-extraction wrapper that keeps reported fractions monotonic and
/// performs the reset on failure.
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: Mutex<f32>,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: Mutex::new(0.0),
        }
    }

    /// Report `stage`, never going below the last reported fraction.
    pub(crate) fn stage(&self, stage: ExtractionStage) {
        let fraction = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            let f = stage.fraction().clamp(0.0, 1.0).max(*last);
            *last = f;
            f
        };
        if let Some(ref cb) = self.callback {
            cb.on_progress(stage, fraction);
        }
    }

    /// Reset progress to zero and report the failure message.
    pub(crate) fn fail(&self, message: &str) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = 0.0;
        if let Some(ref cb) = self.callback {
            cb.on_progress(ExtractionStage::Idle, 0.0);
            cb.on_failure(message);
        }
    }

    pub(crate) fn current(&self) -> f32 {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TrackingCallback {
        seen: Mutex<Vec<(ExtractionStage, f32)>>,
        failures: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_progress(&self, stage: ExtractionStage, fraction: f32) {
            self.seen.lock().unwrap().push((stage, fraction));
        }

        fn on_failure(&self, message: &str) {
            self.failures.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_progress(ExtractionStage::Preprocessing, 0.1);
        cb.on_failure("boom");
    }

    #[test]
    fn stage_fractions_are_ordered() {
        let stages = [
            ExtractionStage::Idle,
            ExtractionStage::Preprocessing,
            ExtractionStage::KeySelected,
            ExtractionStage::RequestBuilt,
            ExtractionStage::AwaitingResponse,
            ExtractionStage::ResponseReceived,
            ExtractionStage::Parsed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].fraction() <= pair[1].fraction());
        }
        assert_eq!(ExtractionStage::Parsed.fraction(), 1.0);
    }

    #[test]
    fn reporter_is_monotonic_and_resets_on_failure() {
        let tracker = Arc::new(TrackingCallback::default());
        let reporter = ProgressReporter::new(Some(tracker.clone() as ProgressCallback));

        reporter.stage(ExtractionStage::AwaitingResponse);
        reporter.stage(ExtractionStage::Preprocessing);
        assert_eq!(reporter.current(), 0.7);

        reporter.fail("Network error: refused");
        assert_eq!(reporter.current(), 0.0);

        let seen = tracker.seen.lock().unwrap();
        assert_eq!(seen[0], (ExtractionStage::AwaitingResponse, 0.7));
        assert_eq!(seen[1], (ExtractionStage::Preprocessing, 0.7));
        assert_eq!(seen[2], (ExtractionStage::Idle, 0.0));
        assert_eq!(tracker.failures.lock().unwrap().as_slice(), ["Network error: refused"]);
    }

    #[test]
    fn reporter_without_callback_still_tracks() {
        let reporter = ProgressReporter::new(None);
        reporter.stage(ExtractionStage::Parsed);
        assert_eq!(reporter.current(), 1.0);
    }
}

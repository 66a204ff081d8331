//! Configuration types for receipt extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across tasks and logged as a whole.
//!
//! The defaults reproduce the fixed wire contract with both providers: JPEG at
//! quality 80, longest side 1024 px, `max_tokens = 4000`, and the two dated
//! model identifiers. Endpoints are overridable only so tests and proxies can
//! point the pipeline elsewhere.

use crate::error::ReceiptError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Messages endpoint of the Anthropic API.
pub const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
/// Chat-completions endpoint of the OpenAI API.
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Model snapshot used for Anthropic keys.
pub const ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
/// Model used for OpenAI keys.
pub const OPENAI_MODEL: &str = "gpt-4o";

/// Configuration for a receipt extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use receipt_scanner::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_dimension(1024)
///     .jpeg_quality(80)
///     .allow_upscale(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Longest permitted side of the uploaded image, in pixels. Default: 1024.
    pub max_dimension: u32,

    /// JPEG quality on a 1–100 scale. Default: 80.
    pub jpeg_quality: u8,

    /// Scale images whose sides are both below `max_dimension` up to it. Default: true.
    ///
    /// The scale factor `min(max / w, max / h)` exceeds 1 for small images.
    /// Enabled by default to match what the providers have been receiving;
    /// set to `false` to never enlarge.
    pub allow_upscale: bool,

    /// Memory budget for decoding the source image, in bytes. Default: 512 MiB.
    ///
    /// Decodes that would allocate more fail with
    /// [`ReceiptError::ImageTooLarge`] instead of exhausting memory.
    pub max_decode_bytes: u64,

    /// `max_tokens` sent to either provider. Default: 4000.
    pub max_tokens: u32,

    /// Model identifier for Anthropic keys.
    pub anthropic_model: String,

    /// Model identifier for OpenAI keys.
    pub openai_model: String,

    /// Anthropic messages URL.
    pub anthropic_endpoint: String,

    /// OpenAI chat-completions URL.
    pub openai_endpoint: String,

    /// Custom extraction prompt. If None, uses [`crate::prompts::RECEIPT_EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Whole-request timeout in seconds. Default: None (HTTP client default).
    pub request_timeout_secs: Option<u64>,

    /// Receives progress fractions as the pipeline advances.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            jpeg_quality: 80,
            allow_upscale: true,
            max_decode_bytes: 512 * 1024 * 1024,
            max_tokens: 4000,
            anthropic_model: ANTHROPIC_MODEL.to_string(),
            openai_model: OPENAI_MODEL.to_string(),
            anthropic_endpoint: ANTHROPIC_ENDPOINT.to_string(),
            openai_endpoint: OPENAI_ENDPOINT.to_string(),
            prompt: None,
            request_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_dimension", &self.max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("allow_upscale", &self.allow_upscale)
            .field("max_decode_bytes", &self.max_decode_bytes)
            .field("max_tokens", &self.max_tokens)
            .field("anthropic_model", &self.anthropic_model)
            .field("openai_model", &self.openai_model)
            .field("anthropic_endpoint", &self.anthropic_endpoint)
            .field("openai_endpoint", &self.openai_endpoint)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.max(1);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn allow_upscale(mut self, v: bool) -> Self {
        self.config.allow_upscale = v;
        self
    }

    pub fn max_decode_bytes(mut self, bytes: u64) -> Self {
        self.config.max_decode_bytes = bytes;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn anthropic_model(mut self, model: impl Into<String>) -> Self {
        self.config.anthropic_model = model.into();
        self
    }

    pub fn openai_model(mut self, model: impl Into<String>) -> Self {
        self.config.openai_model = model.into();
        self
    }

    pub fn anthropic_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.anthropic_endpoint = url.into();
        self
    }

    pub fn openai_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.openai_endpoint = url.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ReceiptError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ReceiptError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.anthropic_model.trim().is_empty() || c.openai_model.trim().is_empty() {
            return Err(ReceiptError::InvalidConfig(
                "model identifiers must not be empty".into(),
            ));
        }
        for url in [&c.anthropic_endpoint, &c.openai_endpoint] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ReceiptError::InvalidConfig(format!(
                    "endpoint must be an HTTP/HTTPS URL, got '{url}'"
                )));
            }
        }
        if matches!(c.request_timeout_secs, Some(0)) {
            return Err(ReceiptError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_contract() {
        let c = ExtractionConfig::default();
        assert_eq!(c.max_dimension, 1024);
        assert_eq!(c.jpeg_quality, 80);
        assert_eq!(c.max_tokens, 4000);
        assert!(c.allow_upscale);
        assert_eq!(c.anthropic_model, "claude-3-5-sonnet-20241022");
        assert_eq!(c.openai_model, "gpt-4o");
        assert_eq!(c.anthropic_endpoint, ANTHROPIC_ENDPOINT);
        assert_eq!(c.openai_endpoint, OPENAI_ENDPOINT);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn builder_clamps_quality() {
        let c = ExtractionConfig::builder().jpeg_quality(0).build().unwrap();
        assert_eq!(c.jpeg_quality, 1);
        let c = ExtractionConfig::builder().jpeg_quality(255).build().unwrap();
        assert_eq!(c.jpeg_quality, 100);
    }

    #[test]
    fn builder_rejects_bad_endpoint() {
        let err = ExtractionConfig::builder()
            .openai_endpoint("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn builder_rejects_zero_tokens_and_timeout() {
        assert!(ExtractionConfig::builder().max_tokens(0).build().is_err());
        assert!(ExtractionConfig::builder().request_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let c = ExtractionConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("max_dimension"));
        assert!(s.contains("progress_callback: None"));
    }
}

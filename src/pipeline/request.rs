//! Provider request construction.
//!
//! Two wire formats are supported and selected purely from the API key:
//! keys starting with `sk-ant` go to Anthropic's messages API, everything
//! else to OpenAI's chat-completions API. [`Provider`] supplies the endpoint,
//! headers and payload for each; the matching response extraction lives in
//! [`crate::pipeline::response`].
//!
//! Building a request is pure: no I/O and no failure modes. A blank key is
//! rejected by the orchestrator before this module is reached.

use crate::config::ExtractionConfig;
use crate::pipeline::preprocess::EncodedImage;
use crate::prompts::RECEIPT_EXTRACTION_PROMPT;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Prefix identifying Anthropic API keys.
pub const ANTHROPIC_KEY_PREFIX: &str = "sk-ant";

/// The vision-LLM provider a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    OpenAi,
}

impl Provider {
    /// Pick the provider from the shape of the API key.
    pub fn detect(api_key: &str) -> Self {
        if api_key.starts_with(ANTHROPIC_KEY_PREFIX) {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
        }
    }

    pub fn endpoint(self, config: &ExtractionConfig) -> &str {
        match self {
            Provider::Anthropic => &config.anthropic_endpoint,
            Provider::OpenAi => &config.openai_endpoint,
        }
    }

    pub fn model(self, config: &ExtractionConfig) -> &str {
        match self {
            Provider::Anthropic => &config.anthropic_model,
            Provider::OpenAi => &config.openai_model,
        }
    }

    fn headers(self, api_key: &str) -> Vec<(String, String)> {
        match self {
            Provider::Anthropic => vec![
                ("x-api-key".to_string(), api_key.to_string()),
                ("anthropic-version".to_string(), "2023-06-01".to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ],
            Provider::OpenAi => vec![
                ("Authorization".to_string(), format!("Bearer {api_key}")),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
        }
    }

    /// One user message: image then prompt for Anthropic, prompt then image
    /// for OpenAI.
    fn payload(self, image: &EncodedImage, prompt: &str, model: &str, max_tokens: u32) -> Value {
        match self {
            Provider::Anthropic => json!({
                "model": model,
                "max_tokens": max_tokens,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": image.mime_type,
                                "data": image.data,
                            }
                        },
                        { "type": "text", "text": prompt }
                    ]
                }]
            }),
            Provider::OpenAi => json!({
                "model": model,
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:{};base64,{}", image.mime_type, image.data)
                            }
                        }
                    ]
                }],
                "max_tokens": max_tokens
            }),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully-specified HTTP POST, independent of any HTTP client.
#[derive(Clone, PartialEq)]
pub struct HttpRequestSpec {
    pub provider: Provider,
    pub url: String,
    /// Header name/value pairs, in the order they are sent.
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequestSpec {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Keys and the base64 image never end up in logs.
impl fmt::Debug for HttpRequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let secret = k.eq_ignore_ascii_case("x-api-key") || k.eq_ignore_ascii_case("authorization");
                (k.as_str(), if secret { "<redacted>" } else { v.as_str() })
            })
            .collect();
        f.debug_struct("HttpRequestSpec")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body_bytes", &self.body.to_string().len())
            .finish()
    }
}

/// Build the provider request for `image`, choosing the provider from `api_key`.
pub fn build_request(image: &EncodedImage, api_key: &str, config: &ExtractionConfig) -> HttpRequestSpec {
    let provider = Provider::detect(api_key);
    let prompt = config.prompt.as_deref().unwrap_or(RECEIPT_EXTRACTION_PROMPT);

    HttpRequestSpec {
        provider,
        url: provider.endpoint(config).to_string(),
        headers: provider.headers(api_key),
        body: provider.payload(image, prompt, provider.model(config), config.max_tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EncodedImage {
        EncodedImage {
            data: "QUJD".into(),
            mime_type: "image/jpeg",
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn detects_provider_from_key_prefix() {
        assert_eq!(Provider::detect("sk-ant-abc123"), Provider::Anthropic);
        assert_eq!(Provider::detect("sk-proj-xyz"), Provider::OpenAi);
        assert_eq!(Provider::detect("sk-an"), Provider::OpenAi);
        assert_eq!(Provider::detect("SK-ANT-upper"), Provider::OpenAi);
    }

    #[test]
    fn anthropic_request_shape() {
        let req = build_request(&image(), "sk-ant-abc123", &ExtractionConfig::default());
        assert_eq!(req.provider, Provider::Anthropic);
        assert_eq!(req.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(req.header("x-api-key"), Some("sk-ant-abc123"));
        assert_eq!(req.header("anthropic-version"), Some("2023-06-01"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert!(req.header("authorization").is_none());

        let b = &req.body;
        assert_eq!(b["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(b["max_tokens"], 4000);
        assert_eq!(b["messages"].as_array().unwrap().len(), 1);
        assert_eq!(b["messages"][0]["role"], "user");
        let content = &b["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[0]["source"]["data"], "QUJD");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], RECEIPT_EXTRACTION_PROMPT);
    }

    #[test]
    fn openai_request_shape() {
        let req = build_request(&image(), "sk-proj-xyz", &ExtractionConfig::default());
        assert_eq!(req.provider, Provider::OpenAi);
        assert_eq!(req.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(req.header("Authorization"), Some("Bearer sk-proj-xyz"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert!(req.header("x-api-key").is_none());

        let b = &req.body;
        assert_eq!(b["model"], "gpt-4o");
        assert_eq!(b["max_tokens"], 4000);
        let content = &b["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], RECEIPT_EXTRACTION_PROMPT);
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn custom_prompt_and_models_are_used() {
        let config = ExtractionConfig::builder()
            .prompt("just the total")
            .openai_model("gpt-4o-mini")
            .max_tokens(512)
            .build()
            .unwrap();
        let req = build_request(&image(), "key", &config);
        assert_eq!(req.body["model"], "gpt-4o-mini");
        assert_eq!(req.body["max_tokens"], 512);
        assert_eq!(req.body["messages"][0]["content"][0]["text"], "just the total");
    }

    #[test]
    fn debug_redacts_secrets() {
        let req = build_request(&image(), "sk-ant-secret", &ExtractionConfig::default());
        let s = format!("{req:?}");
        assert!(!s.contains("sk-ant-secret"));
        assert!(!s.contains("QUJD"));
        assert!(s.contains("<redacted>"));
    }
}

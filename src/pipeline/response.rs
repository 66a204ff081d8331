//! Provider response extraction: envelope JSON → assistant text.
//!
//! Each provider wraps the model's answer differently:
//!
//! ```text
//! anthropic  { "content": [ { "type": "text", "text": "<answer>" } ], … }
//! openai     { "choices": [ { "message": { "content": "<answer>" } } ], … }
//! ```
//!
//! Everything else in the envelope (ids, usage, stop reasons) is ignored. A
//! missing piece is a [`ReceiptError::MalformedProviderResponse`], which is
//! kept separate from a receipt that fails to parse later on.

use crate::error::ReceiptError;
use crate::pipeline::request::Provider;
use serde_json::Value;
use tracing::debug;

/// Pull the assistant text out of a raw provider response body.
pub fn extract_assistant_text(raw_body: &str, provider: Provider) -> Result<String, ReceiptError> {
    let envelope: Value = serde_json::from_str(raw_body).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    if !envelope.is_object() {
        return Err(malformed(format!("expected an object, got {}", type_name(&envelope))));
    }

    let text = match provider {
        Provider::Anthropic => {
            let first = first_element(&envelope, "content")?;
            first
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("content[0].text is missing or not a string".into()))?
        }
        Provider::OpenAi => {
            let first = first_element(&envelope, "choices")?;
            first
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("choices[0].message.content is missing or not a string".into()))?
        }
    };

    debug!("{} assistant text: {} chars", provider, text.len());
    Ok(text.to_string())
}

fn first_element<'a>(envelope: &'a Value, field: &str) -> Result<&'a Value, ReceiptError> {
    let array = envelope
        .get(field)
        .ok_or_else(|| malformed(format!("'{field}' is missing")))?
        .as_array()
        .ok_or_else(|| malformed(format!("'{field}' is not an array")))?;
    array
        .first()
        .ok_or_else(|| malformed(format!("'{field}' is empty")))
}

fn malformed(detail: String) -> ReceiptError {
    ReceiptError::MalformedProviderResponse { detail }
}

/// JSON type name for diagnostics.
pub(crate) fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn anthropic_envelope() {
        let body = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "{\"description\":\"Cafe\"}"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1200, "output_tokens": 40}
        }"#;
        let text = extract_assistant_text(body, Provider::Anthropic).unwrap();
        assert_eq!(text, r#"{"description":"Cafe"}"#);
    }

    #[test]
    fn openai_envelope() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{}"}, "finish_reason": "stop"}]
        }"#;
        assert_eq!(extract_assistant_text(body, Provider::OpenAi).unwrap(), "{}");
    }

    #[test]
    fn wrong_provider_shape_is_malformed() {
        let openai_body = r#"{"choices":[{"message":{"content":"{}"}}]}"#;
        let err = extract_assistant_text(openai_body, Provider::Anthropic).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedProviderResponse);
        assert!(err.to_string().contains("'content' is missing"));
    }

    #[test]
    fn empty_array_is_malformed() {
        let err = extract_assistant_text(r#"{"content":[]}"#, Provider::Anthropic).unwrap_err();
        assert!(err.to_string().contains("'content' is empty"));
        let err = extract_assistant_text(r#"{"choices":[]}"#, Provider::OpenAi).unwrap_err();
        assert!(err.to_string().contains("'choices' is empty"));
    }

    #[test]
    fn non_string_text_is_malformed() {
        let err = extract_assistant_text(r#"{"content":[{"text":42}]}"#, Provider::Anthropic).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedProviderResponse);
        let err = extract_assistant_text(r#"{"choices":[{"message":null}]}"#, Provider::OpenAi).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedProviderResponse);
    }

    #[test]
    fn non_json_and_non_object_are_malformed() {
        for body in ["<html>502</html>", "[1,2]", "\"text\""] {
            let err = extract_assistant_text(body, Provider::OpenAi).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedProviderResponse, "{body}");
        }
    }
}

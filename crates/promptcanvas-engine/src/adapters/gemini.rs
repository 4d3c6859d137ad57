//! Pieces shared by the two adapters that talk to the `generateContent` API.

use std::time::Duration;

use promptcanvas_contracts::credentials::ProviderCredential;
use promptcanvas_contracts::result::{ErrorKind, GenerationFailure, ImageData};
use serde_json::{json, Value};

use super::transport_failure;
use crate::images;
use crate::normalizer::{RawPart, RawProviderResponse};
use crate::transport::{truncate_text, HttpReply, HttpRequest, HttpTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeminiEndpoint {
    api_base: String,
    model: String,
}

impl GeminiEndpoint {
    pub(crate) fn new(api_base: &str, model: &str) -> Self {
        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
        }
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn url(&self) -> String {
        let model_path = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    pub(crate) fn request(
        &self,
        credential: &ProviderCredential,
        payload: Value,
        timeout: Duration,
    ) -> HttpRequest {
        HttpRequest::post(self.url(), payload, timeout).with_query("key", credential.expose())
    }
}

pub(crate) fn inline_image_part(image: &ImageData) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": images::to_base64(&image.bytes),
        }
    })
}

/// Sends the request and returns the decoded JSON body of a 2xx reply.
pub(crate) fn dispatch(
    transport: &dyn HttpTransport,
    provider: &str,
    request: &HttpRequest,
) -> Result<Value, GenerationFailure> {
    let reply = transport
        .post_json(request)
        .map_err(|err| transport_failure(provider, &err))?;
    if !reply.is_success() {
        return Err(status_failure(provider, &reply));
    }
    reply.json().map_err(|err| {
        GenerationFailure::new(
            ErrorKind::DecodeError,
            format!("{provider} returned invalid JSON payload: {err:#}"),
        )
    })
}

/// 401/403, or a 400 naming the key, mean the credential was refused.
pub(crate) fn status_failure(provider: &str, reply: &HttpReply) -> GenerationFailure {
    let body = reply.text();
    let detail = reply
        .json()
        .ok()
        .and_then(|payload| {
            payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 512));

    let key_rejected = matches!(reply.status, 401 | 403)
        || (reply.status == 400
            && (body.contains("API_KEY_INVALID") || body.contains("API key not valid")));
    let kind = if key_rejected {
        ErrorKind::InvalidCredential
    } else {
        ErrorKind::ProviderError
    };
    GenerationFailure::new(kind, format!("{provider} request failed: {detail}"))
        .with_status(reply.status)
}

/// `promptFeedback.blockReason`, present when the prompt itself was refused.
pub(crate) fn block_reason(payload: &Value) -> Option<String> {
    let has_candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| !candidates.is_empty())
        .unwrap_or(false);
    if has_candidates {
        return None;
    }
    payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Flattens every candidate's parts, in order. Accepts camelCase and snake_case keys.
pub(crate) fn candidate_parts(payload: &Value) -> RawProviderResponse {
    let mut out = Vec::new();
    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for candidate in candidates {
        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push(RawPart::Text(text.to_string()));
                continue;
            }
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string);
            out.push(RawPart::InlineImage {
                data: data.to_string(),
                mime_type,
            });
        }
    }
    RawProviderResponse::Parts(out)
}

/// Only the text parts, as one completion.
pub(crate) fn candidate_text(payload: &Value) -> RawProviderResponse {
    let RawProviderResponse::Parts(parts) = candidate_parts(payload) else {
        return RawProviderResponse::Parts(Vec::new());
    };
    let texts = parts
        .into_iter()
        .filter_map(|part| match part {
            RawPart::Text(text) => Some(text),
            _ => None,
        })
        .collect::<Vec<String>>();
    RawProviderResponse::Completion(texts.join("\n"))
}

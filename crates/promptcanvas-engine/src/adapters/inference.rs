use std::sync::Arc;
use std::time::Duration;

use promptcanvas_contracts::credentials::ProviderCredential;
use promptcanvas_contracts::request::ProviderId;
use promptcanvas_contracts::result::{ErrorKind, GenerationFailure, GenerationResult, ImageData};
use promptcanvas_contracts::settings::{AppSettings, InferenceSettings};
use serde_json::{json, Value};

use super::{transport_failure, ProviderAdapter};
use crate::composer::EnrichedPrompt;
use crate::normalizer::{normalize, RawProviderResponse};
use crate::transport::{truncate_text, HttpReply, HttpRequest, HttpTransport};

const PROVIDER: &str = "Hugging Face";

/// Hosted text-to-image diffusion endpoint. Replies with raw image bytes.
pub struct ExternalInferenceAdapter {
    settings: InferenceSettings,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl ExternalInferenceAdapter {
    pub fn new(settings: &AppSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings: settings.inference.clone(),
            timeout: settings.request_timeout,
            transport,
        }
    }

    fn build_payload(&self, prompt: &EnrichedPrompt) -> Value {
        json!({
            "inputs": prompt.as_str(),
            "parameters": {
                "num_inference_steps": self.settings.steps,
                "guidance_scale": self.settings.guidance_scale,
                "width": self.settings.width,
                "height": self.settings.height,
            }
        })
    }

    fn interpret_reply(reply: HttpReply) -> GenerationResult {
        match reply.status {
            200..=299 if reply.is_json() => Self::interpret_json(&reply),
            200..=299 => normalize(RawProviderResponse::Binary {
                bytes: reply.body,
                content_type: reply.content_type,
            }),
            503 => GenerationResult::Failure(
                GenerationFailure::new(
                    ErrorKind::ModelWarmingUp,
                    "model is loading; wait a moment and try again",
                )
                .with_status(503),
            ),
            status => GenerationResult::Failure(
                GenerationFailure::new(
                    ErrorKind::ProviderError,
                    format!(
                        "{PROVIDER} generation failed: {}",
                        truncate_text(reply.text().trim(), 512)
                    ),
                )
                .with_status(status),
            ),
        }
    }

    /// Some deployments answer 200 with JSON instead of bytes.
    fn interpret_json(reply: &HttpReply) -> GenerationResult {
        let payload = match reply.json() {
            Ok(payload) => payload,
            Err(err) => {
                return GenerationResult::failure(ErrorKind::DecodeError, format!("{err:#}"));
            }
        };
        let first = match &payload {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        let image_field = ["image", "b64_json", "generated_image"]
            .iter()
            .find_map(|key| first.get(*key).and_then(Value::as_str));
        if let Some(data) = image_field {
            return normalize(RawProviderResponse::Base64Image {
                data: data.to_string(),
                mime_type: None,
            });
        }
        if let Some(error) = first.get("error").and_then(Value::as_str) {
            return GenerationResult::failure(
                ErrorKind::ProviderError,
                format!("{PROVIDER} generation failed: {error}"),
            );
        }
        normalize(RawProviderResponse::Parts(Vec::new()))
    }
}

impl ProviderAdapter for ExternalInferenceAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::ExternalInference
    }

    fn generate(
        &self,
        prompt: &EnrichedPrompt,
        credential: &ProviderCredential,
        input_image: Option<&ImageData>,
    ) -> GenerationResult {
        if input_image.is_some() {
            return GenerationResult::failure(
                ErrorKind::InvalidRequest,
                format!("{PROVIDER} supports text-to-image only"),
            );
        }
        let request =
            HttpRequest::post(&self.settings.url, self.build_payload(prompt), self.timeout)
                .with_bearer(Some(credential.expose()));
        match self.transport.post_json(&request) {
            Ok(reply) => Self::interpret_reply(reply),
            Err(err) => GenerationResult::Failure(transport_failure(PROVIDER, &err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, ScriptedTransport};

    fn generate(transport: &Arc<ScriptedTransport>) -> GenerationResult {
        ExternalInferenceAdapter::new(&AppSettings::default(), transport.clone()).generate(
            &EnrichedPrompt::verbatim("a lighthouse"),
            &ProviderCredential::new("hf_token"),
            None,
        )
    }

    #[test]
    fn binary_reply_becomes_image_and_payload_is_fixed() {
        let png = png_bytes(1, 1);
        let transport = ScriptedTransport::new()
            .reply(200, "image/png", png.clone())
            .into_arc();

        let result = generate(&transport);
        assert_eq!(result.image().map(|image| image.bytes.clone()), Some(png));

        let request = &transport.requests()[0];
        assert_eq!(request.bearer.as_deref(), Some("hf_token"));
        assert!(request.query.is_empty());
        assert_eq!(request.body["inputs"], json!("a lighthouse"));
        assert_eq!(
            request.body["parameters"],
            json!({ "num_inference_steps": 20, "guidance_scale": 7.5, "width": 512, "height": 512 })
        );
    }

    #[test]
    fn status_503_is_warming_up() {
        let transport = ScriptedTransport::new()
            .json(503, json!({ "error": "Model is currently loading", "estimated_time": 20.0 }))
            .into_arc();
        let result = generate(&transport);
        assert_eq!(result.error_kind(), Some(ErrorKind::ModelWarmingUp));
        assert_eq!(result.as_failure().and_then(|f| f.status), Some(503));
    }

    #[test]
    fn other_statuses_are_provider_errors() {
        let transport = ScriptedTransport::new()
            .reply(401, "text/plain", b"Invalid credentials in Authorization header".to_vec())
            .reply(500, "text/plain", b"boom".to_vec())
            .into_arc();
        for expected in [401, 500] {
            let result = generate(&transport);
            assert_eq!(result.error_kind(), Some(ErrorKind::ProviderError));
            assert_eq!(result.as_failure().and_then(|f| f.status), Some(expected));
        }
    }

    #[test]
    fn corrupt_bytes_and_transport_errors() {
        let transport = ScriptedTransport::new()
            .reply(200, "image/png", b"not really a png".to_vec())
            .fail("operation timed out")
            .into_arc();
        assert_eq!(
            generate(&transport).error_kind(),
            Some(ErrorKind::DecodeError)
        );
        assert_eq!(
            generate(&transport).error_kind(),
            Some(ErrorKind::TransportError)
        );
    }

    #[test]
    fn json_success_shapes() {
        let png = png_bytes(1, 1);
        let encoded = crate::images::to_base64(&png);
        let transport = ScriptedTransport::new()
            .json(200, json!([{ "b64_json": encoded }]))
            .json(200, json!({ "error": "quota exceeded" }))
            .json(200, json!({}))
            .into_arc();
        assert_eq!(
            generate(&transport).image().map(|image| image.bytes.clone()),
            Some(png)
        );
        assert_eq!(
            generate(&transport).error_kind(),
            Some(ErrorKind::ProviderError)
        );
        assert_eq!(
            generate(&transport).error_kind(),
            Some(ErrorKind::EmptyResponse)
        );
    }

    #[test]
    fn input_image_is_rejected_without_a_call() {
        let transport = ScriptedTransport::new().into_arc();
        let result = ExternalInferenceAdapter::new(&AppSettings::default(), transport.clone())
            .generate(
                &EnrichedPrompt::verbatim("edit me"),
                &ProviderCredential::new("hf_token"),
                Some(&ImageData::new(png_bytes(1, 1), "image/png")),
            );
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidRequest));
        assert!(transport.requests().is_empty());
    }
}

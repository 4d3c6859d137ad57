use std::sync::Arc;
use std::time::Duration;

use promptcanvas_contracts::credentials::ProviderCredential;
use promptcanvas_contracts::request::ProviderId;
use promptcanvas_contracts::result::{ErrorKind, GenerationResult, ImageData};
use promptcanvas_contracts::settings::{AppSettings, SafetyPolicy};
use serde_json::{json, Map, Value};

use super::gemini::{self, GeminiEndpoint};
use super::ProviderAdapter;
use crate::composer::EnrichedPrompt;
use crate::normalizer::normalize;
use crate::transport::HttpTransport;

/// Multimodal model that returns images inline. Supports editing an input image.
pub struct NativeMultimodalAdapter {
    endpoint: GeminiEndpoint,
    safety_policy: SafetyPolicy,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl NativeMultimodalAdapter {
    pub fn new(settings: &AppSettings, transport: Arc<dyn HttpTransport>) -> Self {
        for (category, threshold) in settings.safety_policy.overrides() {
            log::warn!(
                "native generation will send {category} with threshold {}",
                threshold.as_api_str()
            );
        }
        Self {
            endpoint: GeminiEndpoint::new(&settings.gemini_api_base, &settings.image_model),
            safety_policy: settings.safety_policy,
            timeout: settings.request_timeout,
            transport,
        }
    }

    fn build_payload(&self, prompt: &EnrichedPrompt, input_image: Option<&ImageData>) -> Value {
        let mut parts = vec![json!({ "text": prompt.as_str() })];
        if let Some(image) = input_image {
            parts.push(gemini::inline_image_part(image));
        }

        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            json!([{ "role": "user", "parts": parts }]),
        );
        payload.insert(
            "generationConfig".to_string(),
            json!({ "responseModalities": ["TEXT", "IMAGE"] }),
        );
        let overrides = self.safety_policy.overrides();
        if !overrides.is_empty() {
            let settings = overrides
                .into_iter()
                .map(|(category, threshold)| {
                    json!({
                        "category": category.as_api_str(),
                        "threshold": threshold.as_api_str(),
                    })
                })
                .collect::<Vec<Value>>();
            payload.insert("safetySettings".to_string(), Value::Array(settings));
        }
        Value::Object(payload)
    }
}

impl ProviderAdapter for NativeMultimodalAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Native
    }

    fn generate(
        &self,
        prompt: &EnrichedPrompt,
        credential: &ProviderCredential,
        input_image: Option<&ImageData>,
    ) -> GenerationResult {
        log::debug!(
            "native generate model={} edit={} prompt={}",
            self.endpoint.model(),
            input_image.is_some(),
            &prompt.fingerprint()[..12]
        );
        let request = self.endpoint.request(
            credential,
            self.build_payload(prompt, input_image),
            self.timeout,
        );
        let payload = match gemini::dispatch(self.transport.as_ref(), "Gemini", &request) {
            Ok(payload) => payload,
            Err(failure) => return GenerationResult::Failure(failure),
        };
        if let Some(reason) = gemini::block_reason(&payload) {
            return GenerationResult::failure(
                ErrorKind::ProviderError,
                format!("Gemini blocked the prompt ({reason})"),
            );
        }
        normalize(gemini::candidate_parts(&payload))
    }
}

use std::sync::Arc;
use std::time::Duration;

use promptcanvas_contracts::credentials::ProviderCredential;
use promptcanvas_contracts::request::ProviderId;
use promptcanvas_contracts::result::{ErrorKind, GenerationResult, ImageData};
use promptcanvas_contracts::settings::AppSettings;
use serde_json::json;

use super::gemini::{self, GeminiEndpoint};
use super::ProviderAdapter;
use crate::composer::{conceptual_instruction, EnrichedPrompt};
use crate::normalizer::normalize;
use crate::transport::HttpTransport;

/// Text model that writes a detailed description of the image instead of drawing it.
pub struct ConceptualTextAdapter {
    endpoint: GeminiEndpoint,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl ConceptualTextAdapter {
    pub fn new(settings: &AppSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoint: GeminiEndpoint::new(&settings.gemini_api_base, &settings.text_model),
            timeout: settings.request_timeout,
            transport,
        }
    }

    /// Sends `prompt` to the text model as-is.
    pub(crate) fn complete(
        &self,
        prompt: &EnrichedPrompt,
        credential: &ProviderCredential,
        input_image: Option<&ImageData>,
    ) -> GenerationResult {
        let mut parts = vec![json!({ "text": prompt.as_str() })];
        if let Some(image) = input_image {
            parts.push(gemini::inline_image_part(image));
        }
        let payload = json!({ "contents": [{ "role": "user", "parts": parts }] });
        let request = self.endpoint.request(credential, payload, self.timeout);

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
        normalize(gemini::candidate_text(&payload))
    }
}

impl ProviderAdapter for ConceptualTextAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Conceptual
    }

    fn generate(
        &self,
        prompt: &EnrichedPrompt,
        credential: &ProviderCredential,
        input_image: Option<&ImageData>,
    ) -> GenerationResult {
        self.complete(&conceptual_instruction(prompt), credential, input_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gemini_image_reply, gemini_text_reply, png_bytes, ScriptedTransport};

    #[test]
    fn description_comes_back_as_text() {
        let transport = ScriptedTransport::new()
            .json(200, gemini_text_reply("A glossy red cube resting on white."))
            .into_arc();
        let adapter = ConceptualTextAdapter::new(&AppSettings::default(), transport.clone());

        let result = adapter.generate(
            &EnrichedPrompt::verbatim("a red cube"),
            &ProviderCredential::new("AIzaTestKey"),
            None,
        );
        assert_eq!(result.text(), Some("A glossy red cube resting on white."));

        let request = &transport.requests()[0];
        assert!(request.url.ends_with("/models/gemini-1.5-flash:generateContent"));
        assert_eq!(
            request.body["contents"][0]["parts"][0]["text"],
            json!("Create a detailed description for this image: a red cube")
        );
        assert!(request.body.get("generationConfig").is_none());
    }

    #[test]
    fn stray_image_parts_are_ignored() {
        let transport = ScriptedTransport::new()
            .json(200, gemini_image_reply(&png_bytes(1, 1)))
            .into_arc();
        let adapter = ConceptualTextAdapter::new(&AppSettings::default(), transport);
        let result = adapter.generate(
            &EnrichedPrompt::verbatim("a red cube"),
            &ProviderCredential::new("AIzaTestKey"),
            None,
        );
        assert_eq!(result.text(), Some("Here is your image."));
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let transport = ScriptedTransport::new()
            .reply(200, "application/json", b"{not json".to_vec())
            .into_arc();
        let adapter = ConceptualTextAdapter::new(&AppSettings::default(), transport);
        let result = adapter.generate(
            &EnrichedPrompt::verbatim("a red cube"),
            &ProviderCredential::new("AIzaTestKey"),
            None,
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::DecodeError));
    }
}

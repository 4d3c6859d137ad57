use std::sync::Arc;

use promptcanvas_contracts::credentials::ProviderCredential;
use promptcanvas_contracts::request::ProviderId;
use promptcanvas_contracts::result::{ErrorKind, GenerationResult};
use promptcanvas_contracts::settings::AppSettings;

use crate::adapters::{build_adapter, ConceptualTextAdapter, ProviderAdapter};
use crate::composer::EnrichedPrompt;
use crate::transport::HttpTransport;

pub const PROBE_PROMPT: &str = "Reply with the single word: ready";

enum ProbeTarget {
    /// Plain completion against the Gemini text model.
    GeminiText(ConceptualTextAdapter),
    Adapter(Box<dyn ProviderAdapter>),
}

/// Answers "does this credential reach the provider?" with one cheap call.
pub struct ConnectionValidator {
    provider: ProviderId,
    target: ProbeTarget,
}

impl ConnectionValidator {
    pub fn new(adapter: Box<dyn ProviderAdapter>) -> Self {
        Self {
            provider: adapter.id(),
            target: ProbeTarget::Adapter(adapter),
        }
    }

    /// Gemini-backed providers share one key, so they are probed through the
    /// text model, which costs less than an image call.
    pub fn for_provider(
        provider: ProviderId,
        settings: &AppSettings,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        match provider {
            ProviderId::Native | ProviderId::Conceptual => Self {
                provider,
                target: ProbeTarget::GeminiText(ConceptualTextAdapter::new(settings, transport)),
            },
            other => Self::new(build_adapter(other, settings, transport)),
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// True when the provider accepted the credential and answered.
    /// Content problems in the answer (empty or undecodable) still count as reachable.
    pub fn check(&self, credential: &ProviderCredential) -> bool {
        if credential.is_empty() {
            return false;
        }
        let probe = EnrichedPrompt::verbatim(PROBE_PROMPT);
        let result = match &self.target {
            ProbeTarget::GeminiText(adapter) => adapter.complete(&probe, credential, None),
            ProbeTarget::Adapter(adapter) => adapter.generate(&probe, credential, None),
        };
        match result {
            GenerationResult::Image(_) | GenerationResult::Text(_) => true,
            GenerationResult::Failure(failure) => match failure.kind {
                ErrorKind::EmptyResponse | ErrorKind::DecodeError => true,
                _ => {
                    log::info!(
                        "{} connection check failed: {failure}",
                        self.provider.display_name()
                    );
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{gemini_text_reply, ScriptedTransport};

    fn validator(transport: &Arc<ScriptedTransport>) -> ConnectionValidator {
        ConnectionValidator::for_provider(
            ProviderId::Native,
            &AppSettings::default(),
            transport.clone(),
        )
    }

    #[test]
    fn successful_probe_is_true() {
        let transport = ScriptedTransport::new()
            .json(200, gemini_text_reply("ready"))
            .into_arc();
        assert!(validator(&transport).check(&ProviderCredential::new("AIzaTestKey")));

        let request = &transport.requests()[0];
        assert!(request.url.contains("gemini-1.5-flash"));
        assert_eq!(
            request.body["contents"][0]["parts"][0]["text"],
            json!(PROBE_PROMPT)
        );
    }

    #[test]
    fn conceptual_probe_sends_the_fixed_prompt_unwrapped() {
        let transport = ScriptedTransport::new()
            .json(200, gemini_text_reply("ready"))
            .into_arc();
        let checker = ConnectionValidator::for_provider(
            ProviderId::Conceptual,
            &AppSettings::default(),
            transport.clone(),
        );
        assert_eq!(checker.provider(), ProviderId::Conceptual);
        assert!(checker.check(&ProviderCredential::new("AIzaTestKey")));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].body["contents"][0]["parts"][0]["text"],
            json!(PROBE_PROMPT)
        );
    }

    #[test]
    fn empty_answer_still_counts_as_reachable() {
        let transport = ScriptedTransport::new()
            .json(200, json!({ "candidates": [] }))
            .into_arc();
        assert!(validator(&transport).check(&ProviderCredential::new("AIzaTestKey")));
    }

    #[test]
    fn transport_error_and_rejection_are_false() {
        let transport = ScriptedTransport::new()
            .fail("connection reset by peer")
            .json(403, json!({ "error": { "message": "permission denied" } }))
            .into_arc();
        let checker = validator(&transport);
        let key = ProviderCredential::new("AIzaTestKey");
        assert!(!checker.check(&key));
        assert!(!checker.check(&key));
    }

    #[test]
    fn empty_credential_makes_no_call() {
        let transport = ScriptedTransport::new().into_arc();
        assert!(!validator(&transport).check(&ProviderCredential::new("   ")));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn unimplemented_provider_is_never_reachable() {
        let checker = ConnectionValidator::for_provider(
            ProviderId::Replicate,
            &AppSettings::default(),
            ScriptedTransport::new().into_arc(),
        );
        assert_eq!(checker.provider(), ProviderId::Replicate);
        assert!(!checker.check(&ProviderCredential::new("r8_token")));
    }
}

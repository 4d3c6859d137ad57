//! Per-session state and the submit/check/clear flow that drives the adapters.

use std::path::PathBuf;
use std::sync::Arc;

use promptcanvas_contracts::credentials::{CredentialSource, ProviderCredential, ResolvedCredential};
use promptcanvas_contracts::events::{EventLog, EventPayload};
use promptcanvas_contracts::ledger::ConversationLedger;
use promptcanvas_contracts::request::{
    AspectRatio, GenerationRequest, ProviderId, QualityTier, Style,
};
use promptcanvas_contracts::result::{ErrorKind, GenerationResult, ImageData};
use promptcanvas_contracts::settings::AppSettings;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::adapters::AdapterRegistry;
use crate::composer::compose_request;
use crate::transport::HttpTransport;
use crate::validator::ConnectionValidator;

/// Selections and transient flags the presentation layer keeps between turns.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub style: Style,
    pub quality: QualityTier,
    pub aspect_ratio: AspectRatio,
    pub provider: ProviderId,
    /// Result of the last connection check; `None` until one runs.
    pub connected: Option<bool>,
    pub pending_image: Option<ImageData>,
}

impl UiState {
    pub fn request_for(&self, raw_prompt: &str) -> GenerationRequest {
        let request = GenerationRequest::new(
            raw_prompt,
            self.style,
            self.quality,
            self.aspect_ratio,
            self.provider,
        );
        match self.pending_image.clone() {
            Some(image) => request.with_input_image(image),
            None => request,
        }
    }
}

pub struct SessionContext {
    id: String,
    credential: Option<ResolvedCredential>,
    ledger: ConversationLedger,
    events: EventLog,
    pub ui: UiState,
}

impl SessionContext {
    pub fn new(settings: &AppSettings) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            events: EventLog::disabled(id.clone()),
            id,
            credential: None,
            ledger: ConversationLedger::new(settings.max_history),
            ui: UiState::default(),
        }
    }

    pub fn with_event_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.events = EventLog::to_file(path, self.id.clone());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replacing the credential invalidates the last connection check.
    pub fn set_credential(&mut self, credential: Option<ResolvedCredential>) {
        self.credential = credential.filter(|resolved| !resolved.credential.is_empty());
        self.ui.connected = None;
    }

    pub fn credential(&self) -> Option<&ProviderCredential> {
        self.credential.as_ref().map(|resolved| &resolved.credential)
    }

    pub fn credential_source(&self) -> Option<CredentialSource> {
        self.credential.as_ref().map(|resolved| resolved.source)
    }

    pub fn ledger(&self) -> &ConversationLedger {
        &self.ledger
    }

    pub fn latest_image(&self) -> Option<&ImageData> {
        self.ledger.latest_image()
    }

    fn record(&self, event_type: &str, payload: Value) {
        let payload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = self.events.emit(event_type, payload) {
            log::warn!("event log write failed for {event_type}: {err:#}");
        }
    }
}

pub struct Orchestrator {
    settings: AppSettings,
    transport: Arc<dyn HttpTransport>,
    adapters: AdapterRegistry,
}

impl Orchestrator {
    pub fn new(settings: AppSettings, transport: Arc<dyn HttpTransport>) -> Self {
        let adapters = AdapterRegistry::with_defaults(&settings, transport.clone());
        Self {
            settings,
            transport,
            adapters,
        }
    }

    pub fn with_registry(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn new_session(&self) -> SessionContext {
        SessionContext::new(&self.settings)
    }

    pub fn submit(
        &self,
        session: &mut SessionContext,
        request: &GenerationRequest,
    ) -> GenerationResult {
        let provider = request.provider();
        let prompt = match compose_request(request) {
            Ok(prompt) => prompt,
            Err(err) => {
                session.record(
                    "generation_rejected",
                    json!({ "provider": provider, "reason": format!("{err:#}") }),
                );
                return GenerationResult::failure(ErrorKind::InvalidRequest, format!("{err:#}"));
            }
        };

        let raw_prompt = request.raw_prompt().trim();
        session
            .ledger
            .push_user(raw_prompt, request.input_image().cloned());

        let mut requested = json!({
            "provider": provider,
            "style": request.style().as_str(),
            "quality": request.quality().as_str(),
            "aspect_ratio": request.aspect_ratio().ratio(),
            "edit": request.input_image().is_some(),
            "prompt_sha256": prompt.fingerprint(),
        });
        if provider == ProviderId::Native && self.settings.safety_policy.is_relaxed() {
            let overrides = self
                .settings
                .safety_policy
                .overrides()
                .into_iter()
                .map(|(category, threshold)| {
                    json!({
                        "category": category.as_api_str(),
                        "threshold": threshold.as_api_str(),
                    })
                })
                .collect::<Vec<Value>>();
            requested["safety_overrides"] = Value::Array(overrides);
        }
        session.record("generation_requested", requested);

        let result = match (session.credential(), self.adapters.get(provider)) {
            (None, _) => GenerationResult::failure(
                ErrorKind::InvalidCredential,
                "no API key configured; generation is disabled",
            ),
            (Some(_), None) => GenerationResult::failure(
                ErrorKind::NotImplemented,
                format!("{} is not registered", provider.display_name()),
            ),
            (Some(credential), Some(adapter)) => {
                adapter.generate(&prompt, credential, request.input_image())
            }
        };

        match &result {
            GenerationResult::Image(image) => {
                session.ledger.push_assistant(
                    format!("Generated image for: {raw_prompt}"),
                    Some(image.clone()),
                    None,
                );
            }
            GenerationResult::Text(text) => {
                session.ledger.push_assistant(text.clone(), None, None);
            }
            GenerationResult::Failure(failure) => {
                log::info!("{} generation failed: {failure}", provider.display_name());
                session
                    .ledger
                    .push_assistant(format!("Error: {failure}"), None, Some(failure.kind));
            }
        }

        let failure = result.as_failure();
        session.record(
            "generation_finished",
            json!({
                "provider": provider,
                "result": result.kind_label(),
                "error_kind": failure.map(|failure| failure.kind.as_str()),
                "status": failure.and_then(|failure| failure.status),
                "bytes": result.image().map(ImageData::len),
            }),
        );
        result
    }

    /// Probes the session's current provider and stores the answer in `session.ui.connected`.
    pub fn check_connection(&self, session: &mut SessionContext) -> bool {
        let provider = session.ui.provider;
        let connected = match session.credential() {
            None => false,
            Some(credential) => {
                ConnectionValidator::for_provider(provider, &self.settings, self.transport.clone())
                    .check(credential)
            }
        };
        session.ui.connected = Some(connected);
        session.record(
            "connection_checked",
            json!({
                "provider": provider,
                "connected": connected,
                "credential_source": session.credential_source().map(|source| source.as_str()),
            }),
        );
        connected
    }

    pub fn clear_conversation(&self, session: &mut SessionContext) {
        let dropped = session.ledger.len();
        session.ledger.clear();
        session.record("ledger_cleared", json!({ "turns": dropped }));
    }
}

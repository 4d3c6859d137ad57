//! Provider backends behind one capability: `generate`.

mod conceptual;
mod gemini;
mod inference;
mod native;
mod unimplemented;

use std::sync::Arc;

use indexmap::IndexMap;
use promptcanvas_contracts::credentials::ProviderCredential;
use promptcanvas_contracts::request::ProviderId;
use promptcanvas_contracts::result::{ErrorKind, GenerationFailure, GenerationResult, ImageData};
use promptcanvas_contracts::settings::AppSettings;

use crate::composer::EnrichedPrompt;
use crate::transport::{error_chain_text, is_timeout, HttpTransport};

pub use conceptual::ConceptualTextAdapter;
pub use inference::ExternalInferenceAdapter;
pub use native::NativeMultimodalAdapter;
pub use unimplemented::UnimplementedAdapter;

/// Adapters never panic or return `Err`; every outcome is a `GenerationResult`.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    fn generate(
        &self,
        prompt: &EnrichedPrompt,
        credential: &ProviderCredential,
        input_image: Option<&ImageData>,
    ) -> GenerationResult;
}

pub fn build_adapter(
    provider: ProviderId,
    settings: &AppSettings,
    transport: Arc<dyn HttpTransport>,
) -> Box<dyn ProviderAdapter> {
    match provider {
        ProviderId::Native => Box::new(NativeMultimodalAdapter::new(settings, transport)),
        ProviderId::ExternalInference => {
            Box::new(ExternalInferenceAdapter::new(settings, transport))
        }
        ProviderId::Conceptual => Box::new(ConceptualTextAdapter::new(settings, transport)),
        ProviderId::Replicate | ProviderId::Dalle => Box::new(UnimplementedAdapter::new(provider)),
    }
}

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: IndexMap<ProviderId, Box<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One adapter for every known provider, in `ProviderId::ALL` order.
    pub fn with_defaults(settings: &AppSettings, transport: Arc<dyn HttpTransport>) -> Self {
        let mut registry = Self::new();
        for provider in ProviderId::ALL {
            registry.register_boxed(build_adapter(*provider, settings, transport.clone()));
        }
        registry
    }

    pub fn register<A>(&mut self, adapter: A)
    where
        A: ProviderAdapter + 'static,
    {
        self.register_boxed(Box::new(adapter));
    }

    /// Replaces any adapter already registered under the same id.
    pub fn register_boxed(&mut self, adapter: Box<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn get(&self, provider: ProviderId) -> Option<&dyn ProviderAdapter> {
        self.adapters.get(&provider).map(|adapter| adapter.as_ref())
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.adapters.keys().copied().collect()
    }
}

pub(crate) fn transport_failure(provider: &str, err: &anyhow::Error) -> GenerationFailure {
    let reason = if is_timeout(err) {
        "timed out".to_string()
    } else {
        error_chain_text(err, 320)
    };
    GenerationFailure::new(
        ErrorKind::TransportError,
        format!("{provider} could not be reached: {reason}"),
    )
}

use promptcanvas_contracts::credentials::ProviderCredential;
use promptcanvas_contracts::request::ProviderId;
use promptcanvas_contracts::result::{ErrorKind, GenerationResult, ImageData};

use super::ProviderAdapter;
use crate::composer::EnrichedPrompt;

/// Placeholder for a selectable provider whose integration is not written yet.
pub struct UnimplementedAdapter {
    provider: ProviderId,
}

impl UnimplementedAdapter {
    pub fn new(provider: ProviderId) -> Self {
        Self { provider }
    }
}

impl ProviderAdapter for UnimplementedAdapter {
    fn id(&self) -> ProviderId {
        self.provider
    }

    fn generate(
        &self,
        _prompt: &EnrichedPrompt,
        _credential: &ProviderCredential,
        _input_image: Option<&ImageData>,
    ) -> GenerationResult {
        GenerationResult::failure(
            ErrorKind::NotImplemented,
            format!("{} integration pending", self.provider.display_name()),
        )
    }
}

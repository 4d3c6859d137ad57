//! Prompt enrichment, provider adapters and session orchestration for promptcanvas.

pub mod adapters;
pub mod composer;
pub mod images;
pub mod normalizer;
pub mod session;
pub mod transport;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use adapters::{build_adapter, AdapterRegistry, ProviderAdapter};
pub use composer::{compose, compose_request, EnrichedPrompt};
pub use normalizer::{normalize, RawPart, RawProviderResponse};
pub use session::{Orchestrator, SessionContext, UiState};
pub use transport::{BlockingTransport, HttpReply, HttpRequest, HttpTransport};
pub use validator::ConnectionValidator;

use std::env;
use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use crate::request::ProviderId;

pub const SECRETS_PATH_ENV: &str = "PROMPTCANVAS_SECRETS";

/// Opaque API key. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredential(String);

impl ProviderCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderCredential(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Override,
    SecretStore,
    Environment,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Override => "override",
            CredentialSource::SecretStore => "secret_store",
            CredentialSource::Environment => "environment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub credential: ProviderCredential,
    pub source: CredentialSource,
}

/// Flat JSON object of named secrets, e.g. `{"gemini_api_key": "..."}`.
///
/// A missing or unreadable file behaves like an empty store.
#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    values: Map<String, Value>,
}

impl SecretStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let values = match read_json_object(path) {
            Ok(values) => values,
            Err(err) => {
                if path.exists() {
                    log::warn!("ignoring secret store {}: {err:#}", path.display());
                }
                Map::new()
            }
        };
        Self { values }
    }

    /// Store named by `PROMPTCANVAS_SECRETS`, or an empty one.
    pub fn from_env() -> Self {
        match env::var(SECRETS_PATH_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            Some(path) => Self::load(path),
            None => Self::empty(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Resolve the key for `provider`: explicit override, then secret store, then
/// environment. `None` means every provider operation stays disabled.
pub fn resolve_credential(
    provider: ProviderId,
    override_value: Option<&str>,
    store: &SecretStore,
) -> Option<ResolvedCredential> {
    resolve_credential_with(provider, override_value, store, |name| env::var(name).ok())
}

pub fn resolve_credential_with<F>(
    provider: ProviderId,
    override_value: Option<&str>,
    store: &SecretStore,
    lookup_env: F,
) -> Option<ResolvedCredential>
where
    F: Fn(&str) -> Option<String>,
{
    let resolved = |value: String, source: CredentialSource| ResolvedCredential {
        credential: ProviderCredential::new(value),
        source,
    };

    if let Some(value) = override_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(resolved(value.to_string(), CredentialSource::Override));
    }
    if let Some(value) = store.get(provider.secret_key()) {
        return Some(resolved(value, CredentialSource::SecretStore));
    }
    provider
        .credential_env_vars()
        .iter()
        .filter_map(|name| lookup_env(*name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .map(|value| resolved(value, CredentialSource::Environment))
}

/// Shape check for Google AI Studio keys. Advisory only; the provider decides.
pub fn looks_like_gemini_key(value: &str) -> bool {
    let value = value.trim();
    value.len() > 20 && value.starts_with("AI")
}

fn read_json_object(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let raw = std::fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&raw)?;
    match parsed {
        Value::Object(values) => Ok(values),
        _ => anyhow::bail!("expected a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn store(value: Value) -> SecretStore {
        SecretStore {
            values: value.as_object().cloned().unwrap_or_default(),
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn override_beats_store_and_env() {
        let resolved = resolve_credential_with(
            ProviderId::Native,
            Some("  manual-key "),
            &store(json!({"gemini_api_key": "stored"})),
            env_of(&[("GEMINI_API_KEY", "from-env")]),
        );
        let resolved = resolved.expect("credential");
        assert_eq!(resolved.source, CredentialSource::Override);
        assert_eq!(resolved.credential.expose(), "manual-key");
    }

    #[test]
    fn store_beats_env() {
        let resolved = resolve_credential_with(
            ProviderId::Conceptual,
            Some("   "),
            &store(json!({"gemini_api_key": "stored"})),
            env_of(&[("GEMINI_API_KEY", "from-env")]),
        )
        .expect("credential");
        assert_eq!(resolved.source, CredentialSource::SecretStore);
        assert_eq!(resolved.credential.expose(), "stored");
    }

    #[test]
    fn env_is_consulted_in_order() {
        let resolved = resolve_credential_with(
            ProviderId::Native,
            None,
            &SecretStore::empty(),
            env_of(&[("GEMINI_API_KEY", " "), ("GOOGLE_API_KEY", "google")]),
        )
        .expect("credential");
        assert_eq!(resolved.source, CredentialSource::Environment);
        assert_eq!(resolved.credential.expose(), "google");
    }

    #[test]
    fn nothing_configured_yields_none() {
        let resolved = resolve_credential_with(
            ProviderId::ExternalInference,
            None,
            &store(json!({"gemini_api_key": "not for hf"})),
            env_of(&[("GEMINI_API_KEY", "also not for hf")]),
        );
        assert!(resolved.is_none());
    }

    #[test]
    fn secret_store_loads_json_file_and_tolerates_garbage() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let good = temp.path().join("secrets.json");
        std::fs::write(&good, r#"{"hf_token": "hf_abc", "other": 3}"#)?;
        let loaded = SecretStore::load(&good);
        assert_eq!(loaded.get("hf_token").as_deref(), Some("hf_abc"));
        assert_eq!(loaded.get("other"), None);

        let bad = temp.path().join("broken.json");
        std::fs::write(&bad, "not json")?;
        assert_eq!(SecretStore::load(&bad).get("hf_token"), None);

        let missing = SecretStore::load(temp.path().join("missing.json"));
        assert_eq!(missing.get("hf_token"), None);
        Ok(())
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = ProviderCredential::new("AIzaSecretSecretSecret");
        assert_eq!(format!("{credential:?}"), "ProviderCredential(***)");
    }

    #[test]
    fn gemini_key_shape_hint() {
        assert!(looks_like_gemini_key("AIzaSyA-0123456789abcdefghij"));
        assert!(!looks_like_gemini_key("AIza-short"));
        assert!(!looks_like_gemini_key("sk-0123456789abcdefghijklmnop"));
    }
}

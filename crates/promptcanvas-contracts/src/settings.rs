use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::ledger::DEFAULT_MAX_TURNS;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_INFERENCE_URL: &str =
    "https://api-inference.huggingface.co/models/runwayml/stable-diffusion-v1-5";
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: &'static [HarmCategory] = &[
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];

    pub fn as_api_str(&self) -> &'static str {
        match self {
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        }
    }

    /// Accepts the API name (`HARM_CATEGORY_HATE_SPEECH`) or its short form (`hate-speech`).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace('-', "_");
        let short = normalized
            .strip_prefix("HARM_CATEGORY_")
            .unwrap_or(normalized.as_str());
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_api_str().trim_start_matches("HARM_CATEGORY_") == short)
    }
}

impl fmt::Display for HarmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl BlockThreshold {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            BlockThreshold::BlockNone => "BLOCK_NONE",
            BlockThreshold::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            BlockThreshold::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            BlockThreshold::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

/// Harm-filter configuration sent with native generation requests.
///
/// `ProviderDefault` sends no overrides. Relaxing a category must be requested
/// explicitly and is reported through the session event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyPolicy {
    #[default]
    ProviderDefault,
    Relaxed {
        category: HarmCategory,
        threshold: BlockThreshold,
    },
}

impl SafetyPolicy {
    pub fn relax(category: HarmCategory) -> Self {
        SafetyPolicy::Relaxed {
            category,
            threshold: BlockThreshold::BlockNone,
        }
    }

    pub fn overrides(&self) -> Vec<(HarmCategory, BlockThreshold)> {
        match self {
            SafetyPolicy::ProviderDefault => Vec::new(),
            SafetyPolicy::Relaxed {
                category,
                threshold,
            } => vec![(*category, *threshold)],
        }
    }

    pub fn is_relaxed(&self) -> bool {
        !matches!(self, SafetyPolicy::ProviderDefault)
    }
}

/// Fixed sampling parameters for the external diffusion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    pub url: String,
    pub steps: u32,
    pub guidance_scale: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_INFERENCE_URL.to_string(),
            steps: 20,
            guidance_scale: 7.5,
            width: 512,
            height: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub max_upload_bytes: u64,
    pub supported_formats: Vec<String>,
    pub max_history: usize,
    pub max_input_dimension: u32,
    pub gemini_api_base: String,
    pub image_model: String,
    pub text_model: String,
    pub inference: InferenceSettings,
    pub request_timeout: Duration,
    pub safety_policy: SafetyPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            supported_formats: SUPPORTED_FORMATS.iter().map(|ext| ext.to_string()).collect(),
            max_history: DEFAULT_MAX_TURNS,
            max_input_dimension: 1024,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            inference: InferenceSettings::default(),
            request_timeout: Duration::from_secs(120),
            safety_policy: SafetyPolicy::ProviderDefault,
        }
    }
}

impl AppSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| env::var(name).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut settings = Self::default();

        if let Some(base) = non_empty("GEMINI_API_BASE") {
            settings.gemini_api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_empty("PROMPTCANVAS_IMAGE_MODEL") {
            settings.image_model = model;
        }
        if let Some(model) = non_empty("PROMPTCANVAS_TEXT_MODEL") {
            settings.text_model = model;
        }
        if let Some(url) = non_empty("PROMPTCANVAS_INFERENCE_URL") {
            settings.inference.url = url;
        }
        if let Some(raw) = non_empty("PROMPTCANVAS_MAX_HISTORY") {
            let parsed: usize = raw.parse().with_context(|| {
                format!("PROMPTCANVAS_MAX_HISTORY must be a number, got {raw:?}")
            })?;
            if parsed == 0 {
                bail!("PROMPTCANVAS_MAX_HISTORY must be at least 1");
            }
            settings.max_history = parsed;
        }
        if let Some(raw) = non_empty("PROMPTCANVAS_RELAX_SAFETY") {
            let Some(category) = HarmCategory::parse(&raw) else {
                bail!("PROMPTCANVAS_RELAX_SAFETY names an unknown harm category: {raw}");
            };
            settings.safety_policy = SafetyPolicy::relax(category);
        }
        Ok(settings)
    }

    pub fn is_supported_format(&self, extension: &str) -> bool {
        let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        self.supported_formats.iter().any(|ext| *ext == extension)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_application_constants() {
        let settings = AppSettings::default();
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.max_history, 20);
        assert_eq!(settings.inference.steps, 20);
        assert_eq!(settings.inference.guidance_scale, 7.5);
        assert_eq!(
            (settings.inference.width, settings.inference.height),
            (512, 512)
        );
        assert_eq!(settings.safety_policy, SafetyPolicy::ProviderDefault);
        assert!(settings.safety_policy.overrides().is_empty());
        assert!(settings.is_supported_format(".JPG"));
        assert!(!settings.is_supported_format("gif"));
    }

    #[test]
    fn env_overrides_are_trimmed_and_applied() -> anyhow::Result<()> {
        let settings = AppSettings::from_env_with(lookup(&[
            ("GEMINI_API_BASE", " http://localhost:9000/v1beta/ "),
            ("PROMPTCANVAS_MAX_HISTORY", "6"),
            ("PROMPTCANVAS_IMAGE_MODEL", ""),
            ("PROMPTCANVAS_RELAX_SAFETY", "sexually-explicit"),
        ]))?;
        assert_eq!(settings.gemini_api_base, "http://localhost:9000/v1beta");
        assert_eq!(settings.max_history, 6);
        assert_eq!(settings.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(
            settings.safety_policy.overrides(),
            vec![(HarmCategory::SexuallyExplicit, BlockThreshold::BlockNone)]
        );
        Ok(())
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        let bad_history =
            AppSettings::from_env_with(lookup(&[("PROMPTCANVAS_MAX_HISTORY", "lots")]));
        assert!(bad_history.is_err());

        let zero_history = AppSettings::from_env_with(lookup(&[("PROMPTCANVAS_MAX_HISTORY", "0")]));
        assert!(zero_history.is_err());

        let bad_category =
            AppSettings::from_env_with(lookup(&[("PROMPTCANVAS_RELAX_SAFETY", "spicy")]));
        assert!(bad_category.is_err());
    }

    #[test]
    fn harm_category_parses_api_and_short_names() {
        assert_eq!(
            HarmCategory::parse("HARM_CATEGORY_HATE_SPEECH"),
            Some(HarmCategory::HateSpeech)
        );
        assert_eq!(
            HarmCategory::parse("dangerous_content"),
            Some(HarmCategory::DangerousContent)
        );
        assert_eq!(HarmCategory::parse("violence"), None);
    }
}

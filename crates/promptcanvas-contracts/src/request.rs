use std::fmt;

use serde::Serialize;

use crate::result::ImageData;

/// Visual style selection offered to the user.
///
/// `Natural` is the default and also what unknown selection labels resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    #[default]
    Natural,
    Photorealistic,
    DigitalArt,
    OilPainting,
    Watercolor,
    Anime,
    PencilSketch,
    Cinematic,
    Render3d,
    Minimalist,
}

impl Style {
    pub const ALL: &'static [Style] = &[
        Style::Natural,
        Style::Photorealistic,
        Style::DigitalArt,
        Style::OilPainting,
        Style::Watercolor,
        Style::Anime,
        Style::PencilSketch,
        Style::Cinematic,
        Style::Render3d,
        Style::Minimalist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Natural => "natural",
            Style::Photorealistic => "photorealistic",
            Style::DigitalArt => "digital-art",
            Style::OilPainting => "oil-painting",
            Style::Watercolor => "watercolor",
            Style::Anime => "anime",
            Style::PencilSketch => "pencil-sketch",
            Style::Cinematic => "cinematic",
            Style::Render3d => "3d-render",
            Style::Minimalist => "minimalist",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_label(raw);
        match normalized.as_str() {
            "photo" | "realistic" => return Some(Style::Photorealistic),
            "sketch" | "pencil" => return Some(Style::PencilSketch),
            "3d" | "render" => return Some(Style::Render3d),
            "oil" => return Some(Style::OilPainting),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == normalized)
    }

    /// Lenient lookup for UI selections: unknown labels fall back to the default style.
    pub fn from_selection(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            log::warn!("unknown style selection {raw:?}; using {}", Self::default());
            Self::default()
        })
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityTier {
    Draft,
    #[default]
    Standard,
    High,
    Ultra,
}

impl QualityTier {
    pub const ALL: &'static [QualityTier] = &[
        QualityTier::Draft,
        QualityTier::Standard,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Draft => "draft",
            QualityTier::Standard => "standard",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_label(raw);
        match normalized.as_str() {
            "fast" | "quick" => return Some(QualityTier::Draft),
            "hd" | "high-quality" => return Some(QualityTier::High),
            "max" | "best" => return Some(QualityTier::Ultra),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|tier| tier.as_str() == normalized)
    }

    pub fn from_selection(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            log::warn!("unknown quality selection {raw:?}; using {}", Self::default());
            Self::default()
        })
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AspectRatio {
    #[default]
    Square,
    Portrait,
    Landscape,
    Story,
    Widescreen,
}

impl AspectRatio {
    pub const ALL: &'static [AspectRatio] = &[
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Story,
        AspectRatio::Widescreen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "square",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Landscape => "landscape",
            AspectRatio::Story => "story",
            AspectRatio::Widescreen => "widescreen",
        }
    }

    pub fn ratio(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Story => "9:16",
            AspectRatio::Widescreen => "16:9",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_label(raw);
        match normalized.as_str() {
            "tall" | "vertical" => return Some(AspectRatio::Story),
            "wide" => return Some(AspectRatio::Widescreen),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|aspect| aspect.as_str() == normalized || aspect.ratio() == normalized)
    }

    pub fn from_selection(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            log::warn!("unknown aspect selection {raw:?}; using {}", Self::default());
            Self::default()
        })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifiers for the generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    #[default]
    Native,
    ExternalInference,
    Conceptual,
    Replicate,
    Dalle,
}

impl ProviderId {
    pub const ALL: &'static [ProviderId] = &[
        ProviderId::Native,
        ProviderId::ExternalInference,
        ProviderId::Conceptual,
        ProviderId::Replicate,
        ProviderId::Dalle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Native => "native",
            ProviderId::ExternalInference => "external-inference",
            ProviderId::Conceptual => "conceptual",
            ProviderId::Replicate => "replicate",
            ProviderId::Dalle => "dalle",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Native => "Gemini",
            ProviderId::ExternalInference => "Hugging Face",
            ProviderId::Conceptual => "Gemini text",
            ProviderId::Replicate => "Replicate",
            ProviderId::Dalle => "DALL-E",
        }
    }

    /// Environment variables consulted for this provider's key, in order.
    pub fn credential_env_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderId::Native | ProviderId::Conceptual => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderId::ExternalInference => &["HF_TOKEN", "HUGGINGFACE_API_TOKEN"],
            ProviderId::Replicate => &["REPLICATE_API_TOKEN"],
            ProviderId::Dalle => &["OPENAI_API_KEY"],
        }
    }

    /// Key name inside the secret store file.
    pub fn secret_key(&self) -> &'static str {
        match self {
            ProviderId::Native | ProviderId::Conceptual => "gemini_api_key",
            ProviderId::ExternalInference => "hf_token",
            ProviderId::Replicate => "replicate_api_token",
            ProviderId::Dalle => "openai_api_key",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_label(raw);
        match normalized.as_str() {
            "gemini" | "google" => return Some(ProviderId::Native),
            "huggingface" | "hugging-face" | "hf" | "inference" => {
                return Some(ProviderId::ExternalInference)
            }
            "text" | "describe" => return Some(ProviderId::Conceptual),
            "openai" | "dall-e" => return Some(ProviderId::Dalle),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|provider| provider.as_str() == normalized)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user submission. Fields are read-only once the request is built.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    raw_prompt: String,
    style: Style,
    quality: QualityTier,
    aspect_ratio: AspectRatio,
    provider: ProviderId,
    input_image: Option<ImageData>,
}

impl GenerationRequest {
    pub fn new(
        raw_prompt: impl Into<String>,
        style: Style,
        quality: QualityTier,
        aspect_ratio: AspectRatio,
        provider: ProviderId,
    ) -> Self {
        Self {
            raw_prompt: raw_prompt.into(),
            style,
            quality,
            aspect_ratio,
            provider,
            input_image: None,
        }
    }

    /// Attach a source image, turning the request into an edit.
    pub fn with_input_image(mut self, image: ImageData) -> Self {
        self.input_image = Some(image);
        self
    }

    pub fn raw_prompt(&self) -> &str {
        &self.raw_prompt
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn input_image(&self) -> Option<&ImageData> {
        self.input_image.as_ref()
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '_'], "-")
}

use anyhow::{bail, Result};
use promptcanvas_contracts::request::{AspectRatio, GenerationRequest, QualityTier, Style};
use sha2::{Digest, Sha256};

/// Phrase used for `Style::Natural`, which is also where unknown style labels land.
pub const DEFAULT_STYLE_PHRASE: &str = "in a natural, balanced style";

const CLOSING_DIRECTIVE: &str =
    "Produce one coherent image that matches the description, with no added text or watermarks.";

/// Final text sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnrichedPrompt(String);

impl EnrichedPrompt {
    /// Wrap text that must reach the provider unchanged, such as a health probe.
    pub fn verbatim(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex SHA-256 of the prompt text, for correlating log lines.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

pub fn compose(
    raw_prompt: &str,
    style: Style,
    quality: QualityTier,
    aspect_ratio: AspectRatio,
) -> Result<EnrichedPrompt> {
    let trimmed = raw_prompt.trim();
    if trimmed.is_empty() {
        bail!("prompt must not be empty");
    }
    let content = match trimmed.trim_end_matches(['.', '!', ';', ',']).trim_end() {
        "" => trimmed,
        stripped => stripped,
    };

    let clauses = [
        format!("Create an image of {content}."),
        format!("Render it {}.", style_phrase(style)),
        aspect_phrase(aspect_ratio),
        quality_phrase(quality).to_string(),
        CLOSING_DIRECTIVE.to_string(),
    ];
    Ok(EnrichedPrompt(clauses.join("\n")))
}

pub fn compose_request(request: &GenerationRequest) -> Result<EnrichedPrompt> {
    compose(
        request.raw_prompt(),
        request.style(),
        request.quality(),
        request.aspect_ratio(),
    )
}

/// Instruction used when the user wants a written concept rather than pixels.
pub fn conceptual_instruction(prompt: &EnrichedPrompt) -> EnrichedPrompt {
    EnrichedPrompt(format!(
        "Create a detailed description for this image: {}",
        prompt.as_str()
    ))
}

fn style_phrase(style: Style) -> &'static str {
    match style {
        Style::Natural => DEFAULT_STYLE_PHRASE,
        Style::Photorealistic => {
            "as a photorealistic photograph with true-to-life lighting, textures and detail"
        }
        Style::DigitalArt => "as vibrant digital art with clean, crisp rendering",
        Style::OilPainting => "as a classical oil painting with rich, textured brushstrokes",
        Style::Watercolor => "as a soft watercolor painting with flowing, translucent washes",
        Style::Anime => "as a polished anime illustration with expressive linework",
        Style::PencilSketch => "as a detailed pencil sketch with careful cross-hatched shading",
        Style::Cinematic => {
            "as a cinematic film still with dramatic lighting and shallow depth of field"
        }
        Style::Render3d => "as a high-fidelity 3D render with physically based materials",
        Style::Minimalist => "in a minimalist style with simple shapes and generous negative space",
    }
}

fn aspect_phrase(aspect_ratio: AspectRatio) -> String {
    let orientation = match aspect_ratio {
        AspectRatio::Square => "square",
        AspectRatio::Portrait => "portrait",
        AspectRatio::Landscape => "landscape",
        AspectRatio::Story => "tall vertical",
        AspectRatio::Widescreen => "widescreen",
    };
    format!(
        "Frame it as a {orientation} composition with a {} aspect ratio.",
        aspect_ratio.ratio()
    )
}

fn quality_phrase(quality: QualityTier) -> &'static str {
    match quality {
        QualityTier::Draft => "Keep the rendering quick and loose; fine detail is optional.",
        QualityTier::Standard => "Render with clear, well-defined detail.",
        QualityTier::High => "Render in high definition with sharp focus and intricate detail.",
        QualityTier::Ultra => concat!(
            "Render at the highest possible fidelity: ",
            "ultra-detailed, razor-sharp focus, professional quality."
        ),
    }
}

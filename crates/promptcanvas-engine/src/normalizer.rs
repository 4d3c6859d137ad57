//! Converts every reply shape the providers have used into a `GenerationResult`.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use promptcanvas_contracts::result::{ErrorKind, GenerationResult, ImageData};

#[derive(Debug, Clone, PartialEq)]
pub enum RawPart {
    Text(String),
    InlineImage {
        data: String,
        mime_type: Option<String>,
    },
    ImageBytes {
        bytes: Vec<u8>,
        mime_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawProviderResponse {
    Completion(String),
    Parts(Vec<RawPart>),
    Base64Image {
        data: String,
        mime_type: Option<String>,
    },
    Binary {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

/// Image content wins over text; the first image that decodes is used.
/// Undecodable images fall back to any text; with no text they are a `DecodeError`.
pub fn normalize(raw: RawProviderResponse) -> GenerationResult {
    match raw {
        RawProviderResponse::Completion(text) => text_or_empty(vec![text]),
        RawProviderResponse::Parts(parts) => normalize_parts(parts),
        RawProviderResponse::Base64Image { data, .. } => match decode_base64_image(&data) {
            Ok(image) => GenerationResult::Image(image),
            Err(err) => decode_failure(&err),
        },
        RawProviderResponse::Binary { bytes, .. } => match verify_image(bytes) {
            Ok(image) => GenerationResult::Image(image),
            Err(err) => decode_failure(&err),
        },
    }
}

fn normalize_parts(parts: Vec<RawPart>) -> GenerationResult {
    if parts.is_empty() {
        return GenerationResult::failure(
            ErrorKind::EmptyResponse,
            "provider returned no content parts",
        );
    }

    let mut texts = Vec::new();
    let mut first_decode_error: Option<anyhow::Error> = None;
    for part in parts {
        let decoded = match part {
            RawPart::Text(text) => {
                texts.push(text);
                continue;
            }
            RawPart::InlineImage { data, .. } => decode_base64_image(&data),
            RawPart::ImageBytes { bytes, .. } => verify_image(bytes),
        };
        match decoded {
            Ok(image) => return GenerationResult::Image(image),
            Err(err) => {
                log::debug!("skipping undecodable image part: {err:#}");
                first_decode_error.get_or_insert(err);
            }
        }
    }

    match (text_or_empty(texts), first_decode_error) {
        (GenerationResult::Failure(_), Some(err)) => decode_failure(&err),
        (result, _) => result,
    }
}

fn text_or_empty(texts: Vec<String>) -> GenerationResult {
    let joined = texts
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<&str>>()
        .join("\n");
    if joined.is_empty() {
        return GenerationResult::failure(
            ErrorKind::EmptyResponse,
            "provider returned no usable content",
        );
    }
    GenerationResult::Text(joined)
}

fn decode_failure(err: &anyhow::Error) -> GenerationResult {
    GenerationResult::failure(ErrorKind::DecodeError, format!("{err:#}"))
}

/// Accepts bare base64 or a `data:image/...;base64,` URL.
pub fn decode_base64_image(data: &str) -> Result<ImageData> {
    let trimmed = data.trim();
    let payload = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };
    let bytes = BASE64
        .decode(payload.as_bytes())
        .context("image base64 decode failed")?;
    verify_image(bytes)
}

/// Checks that `bytes` is a complete image in a known format and labels its mime type.
pub fn verify_image(bytes: Vec<u8>) -> Result<ImageData> {
    if bytes.is_empty() {
        bail!("image payload is empty");
    }
    let format = image::guess_format(&bytes).context("unrecognized image format")?;
    image::load_from_memory_with_format(&bytes, format)
        .with_context(|| format!("corrupt {format:?} image data"))?;
    Ok(ImageData::new(bytes, format.to_mime_type()))
}

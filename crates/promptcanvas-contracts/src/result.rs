use std::fmt;

use serde::Serialize;

/// Encoded image plus its mime type. Used for generated images and edit inputs.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Image payloads can be megabytes; keep debug output readable.
impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCredential,
    TransportError,
    ProviderError,
    ModelWarmingUp,
    DecodeError,
    EmptyResponse,
    NotImplemented,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::ModelWarmingUp => "model_warming_up",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::NotImplemented => "not_implemented",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }

    /// Whether a human retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::ModelWarmingUp | ErrorKind::TransportError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl GenerationFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Canonical outcome of one generation call. Exactly one variant is ever populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Image(ImageData),
    Text(String),
    Failure(GenerationFailure),
}

impl GenerationResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        GenerationResult::Failure(GenerationFailure::new(kind, message))
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            GenerationResult::Image(_) => "image",
            GenerationResult::Text(_) => "text",
            GenerationResult::Failure(_) => "failure",
        }
    }

    pub fn image(&self) -> Option<&ImageData> {
        match self {
            GenerationResult::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationResult::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&GenerationFailure> {
        match self {
            GenerationResult::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.as_failure().map(|failure| failure.kind)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, GenerationResult::Failure(_))
    }
}

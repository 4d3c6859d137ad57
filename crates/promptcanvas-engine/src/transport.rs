use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

/// One outbound JSON POST.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Value,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body,
            timeout,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_bearer(mut self, token: Option<&str>) -> Self {
        self.bearer = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.to_ascii_lowercase().contains("json"))
            .unwrap_or(false)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).context("response body is not valid JSON")
    }
}

/// Seam between adapters and the network. Tests substitute a scripted implementation.
pub trait HttpTransport: Send + Sync {
    fn post_json(&self, request: &HttpRequest) -> Result<HttpReply>;
}

/// Sends each request exactly once; failures go straight back to the adapter.
pub struct BlockingTransport {
    http: HttpClient,
}

impl BlockingTransport {
    pub fn new() -> Self {
        Self {
            http: HttpClient::new(),
        }
    }

    #[cfg(test)]
    fn with_client(http: HttpClient) -> Self {
        Self { http }
    }
}

impl Default for BlockingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for BlockingTransport {
    fn post_json(&self, request: &HttpRequest) -> Result<HttpReply> {
        let mut builder = self
            .http
            .post(&request.url)
            .timeout(request.timeout)
            .json(&request.body);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .with_context(|| format!("request failed ({})", request.url))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .with_context(|| format!("response body read failed ({})", request.url))?
            .to_vec();
        Ok(HttpReply {
            status,
            content_type,
            body,
        })
    }
}

pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(reqwest::Error::is_timeout)
            .unwrap_or(false)
    })
}

/// Flattens an error chain into one line, dropping repeated causes.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().map(String::as_str) == Some(trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

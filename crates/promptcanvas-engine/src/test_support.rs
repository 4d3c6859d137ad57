use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};

use crate::transport::{HttpReply, HttpRequest, HttpTransport};

/// Replays queued replies in order and records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, status: u16, content_type: &str, body: Vec<u8>) -> Self {
        self.push(Ok(HttpReply {
            status,
            content_type: Some(content_type.to_string()),
            body,
        }))
    }

    pub(crate) fn json(self, status: u16, body: Value) -> Self {
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        self.reply(status, "application/json", bytes)
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        let message = message.to_string();
        self.push(Err(anyhow!(message)))
    }

    fn push(self, reply: Result<HttpReply>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    pub(crate) fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post_json(&self, request: &HttpRequest) -> Result<HttpReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .map_err(|_| anyhow!("scripted transport lock poisoned"))?
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted reply left")))
    }
}

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png fixture");
    out.into_inner()
}

/// `generateContent` reply carrying one inline PNG and a caption.
pub(crate) fn gemini_image_reply(png: &[u8]) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": "Here is your image." },
                    { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(png) } }
                ]
            }
        }]
    })
}

pub(crate) fn gemini_text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }]
    })
}

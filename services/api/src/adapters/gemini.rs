//! services/api/src/adapters/gemini.rs
//!
//! The shared HTTP client for the Gemini REST API, its wire types, and the
//! server-sent-events decoder used by the streaming endpoints. The per-port
//! adapters in this module's siblings build their requests on top of it.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use skill_tutor_core::{ChunkStream, Citation, MediaInput, PortError, PortResult, StreamChunk};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn media(media: &MediaInput) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob {
                mime_type: media.mime_type.clone(),
                data: STANDARD.encode(&media.data),
            }),
        }
    }
}

/// Inline base64 media, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    pub fn decode(&self) -> PortResult<Vec<u8>> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| PortError::Unexpected(format!("Invalid base64 media from API: {}", e)))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|content| content.parts.iter())
    }

    /// The concatenated text parts of the first candidate, if there are any.
    pub fn text(&self) -> Option<String> {
        let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }

    /// The first inline media part of the first candidate.
    pub fn inline_data(&self) -> Option<&Blob> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }

    /// Web grounding sources with both a URI and a title.
    pub fn citations(&self) -> Vec<Citation> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| match (&web.uri, &web.title) {
                        (Some(uri), Some(title)) if !uri.is_empty() && !title.is_empty() => {
                            Some(Citation {
                                uri: uri.clone(),
                                title: title.clone(),
                            })
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn into_chunk(self) -> StreamChunk {
        StreamChunk {
            text: self.text(),
            citations: self.citations(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

//=========================================================================================
// The Shared Client
//=========================================================================================

/// A thin client for the Gemini REST API carrying the credential and base URL.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// The URL of a resource named by the API, such as `models/x/operations/y`.
    pub fn resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }

    /// Appends the credential as a `key` query parameter, as download links require.
    pub fn with_key(&self, uri: &str) -> String {
        let separator = if uri.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", uri, separator, self.api_key)
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> PortResult<GenerateContentResponse> {
        self.post_json(&self.model_url(model, "generateContent"), request)
            .await
    }

    /// Opens a streaming generation and decodes its server-sent events lazily.
    pub async fn stream_generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> PortResult<ChunkStream> {
        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));
        debug!(model, "Opening streaming generation.");
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let mut body = Box::pin(response.bytes_stream());
        Ok(Box::pin(async_stream::stream! {
            let mut decoder = SseDecoder::default();
            while let Some(bytes) = body.next().await {
                let bytes = match bytes {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(transport_error(e));
                        return;
                    }
                };
                for event in decoder.push(&bytes) {
                    match parse_event(&event) {
                        Ok(chunk) => yield Ok(chunk),
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
            if let Some(event) = decoder.finish() {
                yield parse_event(&event);
            }
        }))
    }

    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> PortResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Unreadable API response: {}", e)))
    }

    pub async fn get_json<R: DeserializeOwned>(&self, url: &str) -> PortResult<R> {
        let response = self
            .http
            .get(url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Unreadable API response: {}", e)))
    }

    /// Fetches the bytes behind an artifact link.
    pub async fn download(&self, uri: &str) -> PortResult<Bytes> {
        let response = self
            .http
            .get(self.with_key(uri))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        response.bytes().await.map_err(transport_error)
    }
}

fn transport_error(e: reqwest::Error) -> PortError {
    PortError::Upstream(format!("Request to the generation API failed: {}", e))
}

/// Turns a non-success response into an upstream error carrying the API's message.
async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = status_error(status, &body);
    warn!(%status, message = %err, "Generation API returned an error.");
    Err(err)
}

fn status_error(status: StatusCode, body: &str) -> PortError {
    let message = upstream_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized(message),
        _ => PortError::Upstream(message),
    }
}

fn upstream_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{} {}: {}", status.as_u16(), code, envelope.error.message),
            None => format!("{}: {}", status.as_u16(), envelope.error.message),
        },
        Err(_) if body.trim().is_empty() => format!("{}", status),
        Err(_) => format!("{}: {}", status.as_u16(), body.trim()),
    }
}

fn parse_event(data: &str) -> PortResult<StreamChunk> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
        return Err(PortError::Upstream(envelope.error.message));
    }
    serde_json::from_str::<GenerateContentResponse>(data)
        .map(GenerateContentResponse::into_chunk)
        .map_err(|e| PortError::Unexpected(format!("Unreadable stream event: {}", e)))
}

//=========================================================================================
// Server-Sent Events
//=========================================================================================

/// Splits an SSE byte stream into the `data` payloads of complete events.
///
/// Bytes are buffered until a full line is available so multi-byte characters
/// split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds bytes and returns the payloads of any events they completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(payload) = line.strip_prefix("data:") {
                self.data.push(payload.trim_start().to_string());
            }
        }
        events
    }

    /// Flushes an event left unterminated at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest);
            if let Some(payload) = rest.trim_end().strip_prefix("data:") {
                self.data.push(payload.trim_start().to_string());
            }
        }
        if self.data.is_empty() {
            None
        } else {
            let event = self.data.join("\n");
            self.data.clear();
            Some(event)
        }
    }
}

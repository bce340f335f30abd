//! services/api/src/adapters/video_llm.rs
//!
//! This module contains the adapter for image-to-video generation.
//! It implements the `VideoGenerationService` port from the `core` crate on top
//! of the long-running operation endpoints.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use skill_tutor_core::{AnimationRequest, GenerationJob, PortError, PortResult, VideoGenerationService};
use tracing::{debug, info};

use super::gemini::GeminiClient;

//=========================================================================================
// Operation Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    metadata: Option<OperationMetadata>,
    #[serde(default)]
    response: Option<OperationResponse>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationMetadata {
    #[serde(default)]
    progress_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: Option<VideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default, alias = "generatedVideos")]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

impl Operation {
    fn into_job(self) -> PortResult<GenerationJob> {
        if let Some(error) = self.error {
            return Err(PortError::Upstream(error.message));
        }
        let result_uri = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri);
        Ok(GenerationJob {
            name: self.name,
            done: self.done,
            progress_percentage: self
                .metadata
                .and_then(|m| m.progress_percentage)
                .unwrap_or(0.0),
            result_uri,
        })
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VideoGenerationService` using a Veo model.
#[derive(Clone)]
pub struct GeminiVideoAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiVideoAdapter {
    /// Creates a new `GeminiVideoAdapter`.
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }
}

fn generation_body(request: &AnimationRequest) -> serde_json::Value {
    json!({
        "instances": [{
            "prompt": request.prompt,
            "image": {
                "bytesBase64Encoded": STANDARD.encode(&request.image.data),
                "mimeType": request.image.mime_type,
            }
        }],
        "parameters": {
            "aspectRatio": request.aspect_ratio.as_str(),
            "resolution": "720p",
            "numberOfVideos": 1,
        }
    })
}

//=========================================================================================
// `VideoGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VideoGenerationService for GeminiVideoAdapter {
    async fn start_generation(&self, request: &AnimationRequest) -> PortResult<GenerationJob> {
        let url = self.client.model_url(&self.model, "predictLongRunning");
        let operation: Operation = self.client.post_json(&url, &generation_body(request)).await?;
        info!(operation = %operation.name, "Video generation started.");
        operation.into_job()
    }

    async fn get_operation(&self, job: &GenerationJob) -> PortResult<GenerationJob> {
        let operation: Operation = self.client.get_json(&self.client.resource_url(&job.name)).await?;
        debug!(operation = %operation.name, done = operation.done, "Polled video operation.");
        operation.into_job()
    }

    async fn download(&self, uri: &str) -> PortResult<Bytes> {
        self.client.download(uri).await
    }
}

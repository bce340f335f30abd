//! services/api/src/adapters/analysis_llm.rs
//!
//! This module contains the adapter for image and video understanding.
//! It implements the `MediaAnalysisService` port from the `core` crate.

use async_trait::async_trait;
use skill_tutor_core::{MediaAnalysisService, MediaInput, PortResult};
use tracing::debug;

use super::gemini::{Content, GeminiClient, GenerateContentRequest, Part};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `MediaAnalysisService` using a multimodal Gemini model.
#[derive(Clone)]
pub struct GeminiAnalysisAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiAnalysisAdapter {
    /// Creates a new `GeminiAnalysisAdapter`.
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `MediaAnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl MediaAnalysisService for GeminiAnalysisAdapter {
    /// Sends the prompt and the inline media as one user turn.
    async fn analyze_media(&self, prompt: &str, media: &MediaInput) -> PortResult<Option<String>> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt), Part::media(media)])],
            ..Default::default()
        };

        debug!(model = %self.model, mime_type = %media.mime_type, "Sending media for analysis.");
        let response = self.client.generate_content(&self.model, &request).await?;
        Ok(response.text())
    }
}

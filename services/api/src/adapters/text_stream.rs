//! services/api/src/adapters/text_stream.rs
//!
//! The low-latency completion stream behind the quick content writer.

use async_trait::async_trait;
use skill_tutor_core::{ChunkStream, PortResult, TextStreamService};

use super::gemini::{Content, GeminiClient, GenerateContentRequest, Part};

#[derive(Clone)]
pub struct GeminiTextStreamAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiTextStreamAdapter {
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl TextStreamService for GeminiTextStreamAdapter {
    async fn stream_text(&self, prompt: &str) -> PortResult<ChunkStream> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt)])],
            ..Default::default()
        };
        self.client
            .stream_generate_content(&self.model, &request)
            .await
    }
}

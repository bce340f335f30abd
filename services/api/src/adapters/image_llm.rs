//! services/api/src/adapters/image_llm.rs
//!
//! This module contains the adapter for text-to-image generation.
//! It implements the `ImageGenerationService` port from the `core` crate.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use skill_tutor_core::domain::DEFAULT_ALT_TEXT;
use skill_tutor_core::{GeneratedImage, ImageGenerationService, ImageSize, PortResult};

use super::gemini::{Content, GeminiClient, GenerateContentRequest, GenerateContentResponse, Part};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ImageGenerationService` using a Gemini image model.
#[derive(Clone)]
pub struct GeminiImageAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiImageAdapter {
    /// Creates a new `GeminiImageAdapter`.
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }
}

/// Pulls the image and its caption out of a reply. Text parts become the alt text.
fn extract_image(response: &GenerateContentResponse) -> PortResult<Option<GeneratedImage>> {
    let Some(blob) = response.inline_data() else {
        return Ok(None);
    };
    let bytes = blob.decode()?;
    Ok(Some(GeneratedImage {
        mime_type: blob.mime_type.clone(),
        bytes: Bytes::from(bytes),
        alt_text: response.text().unwrap_or_else(|| DEFAULT_ALT_TEXT.to_string()),
    }))
}

//=========================================================================================
// `ImageGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageGenerationService for GeminiImageAdapter {
    async fn generate_image(&self, prompt: &str, size: ImageSize) -> PortResult<Option<GeneratedImage>> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt)])],
            generation_config: Some(json!({
                "imageConfig": { "imageSize": size.as_str(), "aspectRatio": "1:1" }
            })),
            tools: vec![json!({ "googleSearch": {} })],
            ..Default::default()
        };

        let response = self.client.generate_content(&self.model, &request).await?;
        extract_image(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_and_caption_are_read_from_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "A tiger in neon light"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw=="}}
            ]}}]}"#,
        )
        .unwrap();

        let image = extract_image(&response).unwrap().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.alt_text, "A tiger in neon light");
        assert_eq!(&image.bytes[..], &[0x89, 0x50, 0x4e, 0x47]);
    }

    #[test]
    fn text_only_replies_have_no_image() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"content": {"parts": [{"text": "sorry"}]}}]}"#)
                .unwrap();
        assert!(extract_image(&response).unwrap().is_none());
    }
}

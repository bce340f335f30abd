//! crates/skill_tutor_core/src/tools.rs
//!
//! Single-purpose studio tools layered over the generation ports. Each one
//! validates the learner's input before touching the network.

use tracing::info;

use crate::domain::{GeneratedImage, ImageSize, MediaInput};
use crate::error::StudioError;
use crate::ports::{ImageGenerationService, MediaAnalysisService, TextToSpeechService};

pub const IMAGE_ANALYSIS_FALLBACK: &str = "Kuch samajh nahi aaya, phir se try karein.";
pub const VIDEO_ANALYSIS_FALLBACK: &str = "Video ajeeb thi, kuch samajh nahi aaya.";
const IMAGE_GENERATION_FAILED: &str = "Image generate nahi ho paayi. Kuch aur try karein.";
const SPEECH_GENERATION_FAILED: &str = "Audio generate nahi ho paaya.";

fn require_prompt(prompt: &str) -> Result<(), StudioError> {
    if prompt.trim().is_empty() {
        return Err(StudioError::Validation("Kripya ek prompt likhein.".to_string()));
    }
    Ok(())
}

fn require_media(media: &MediaInput, what: &str) -> Result<(), StudioError> {
    if media.data.is_empty() {
        return Err(StudioError::Validation(format!("Kripya ek {} upload karein.", what)));
    }
    Ok(())
}

pub async fn analyze_image(
    service: &dyn MediaAnalysisService,
    prompt: &str,
    image: &MediaInput,
) -> Result<String, StudioError> {
    require_prompt(prompt)?;
    require_media(image, "image")?;
    info!(mime_type = %image.mime_type, size = image.data.len(), "Analyzing image.");
    let answer = service.analyze_media(prompt, image).await?;
    Ok(answer.unwrap_or_else(|| IMAGE_ANALYSIS_FALLBACK.to_string()))
}

pub async fn analyze_video(
    service: &dyn MediaAnalysisService,
    prompt: &str,
    video: &MediaInput,
) -> Result<String, StudioError> {
    require_prompt(prompt)?;
    require_media(video, "video")?;
    info!(mime_type = %video.mime_type, size = video.data.len(), "Analyzing video.");
    let answer = service.analyze_media(prompt, video).await?;
    Ok(answer.unwrap_or_else(|| VIDEO_ANALYSIS_FALLBACK.to_string()))
}

pub async fn generate_image(
    service: &dyn ImageGenerationService,
    prompt: &str,
    size: ImageSize,
) -> Result<GeneratedImage, StudioError> {
    require_prompt(prompt)?;
    info!(size = size.as_str(), "Generating image.");
    service
        .generate_image(prompt, size)
        .await?
        .ok_or_else(|| StudioError::Generation(IMAGE_GENERATION_FAILED.to_string()))
}

/// Synthesizes speech and returns the raw PCM samples.
pub async fn generate_speech(
    service: &dyn TextToSpeechService,
    text: &str,
) -> Result<Vec<u8>, StudioError> {
    if text.trim().is_empty() {
        return Err(StudioError::Validation("Padhne ke liye kuch text chahiye.".to_string()));
    }
    let audio = service.generate_audio(text).await?;
    if audio.is_empty() {
        return Err(StudioError::Generation(SPEECH_GENERATION_FAILED.to_string()));
    }
    Ok(audio)
}

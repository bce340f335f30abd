//! crates/skill_tutor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the generation
//! API and session storage sit behind them, and every engine in this crate gets
//! its collaborators injected through them.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::domain::{
    AnimationRequest, GeneratedImage, GenerationJob, ImageSize, LearningModule, MediaInput,
    StreamChunk,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., storage, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    /// The generation API refused the credential. Carries the provider's message.
    #[error("{0}")]
    Unauthorized(String),
    /// The generation API rejected the request. Carries the provider's message.
    #[error("{0}")]
    Upstream(String),
    /// Session storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A provider token stream. Finite and single-use.
pub type ChunkStream = Pin<Box<dyn Stream<Item = PortResult<StreamChunk>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ModuleGenerationService: Send + Sync {
    /// Generates a complete learning module for a skill.
    async fn generate_module(&self, skill_name: &str) -> PortResult<LearningModule>;
}

#[async_trait]
pub trait MediaAnalysisService: Send + Sync {
    /// Answers `prompt` about an image or video. `None` when the model returned no text.
    async fn analyze_media(&self, prompt: &str, media: &MediaInput) -> PortResult<Option<String>>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Generates a square image. `None` when the reply carried no image data.
    async fn generate_image(&self, prompt: &str, size: ImageSize)
        -> PortResult<Option<GeneratedImage>>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates little-endian 16-bit mono PCM audio from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait TextStreamService: Send + Sync {
    /// Opens a plain completion stream for `prompt`.
    async fn stream_text(&self, prompt: &str) -> PortResult<ChunkStream>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn start_chat(&self, system_instruction: &str) -> PortResult<Arc<dyn ChatSession>>;
}

#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Sends one user turn and streams the reply, with grounding citations when available.
    async fn send_message_stream(&self, message: &str) -> PortResult<ChunkStream>;
}

#[async_trait]
pub trait VideoGenerationService: Send + Sync {
    /// Starts an image-to-video operation.
    async fn start_generation(&self, request: &AnimationRequest) -> PortResult<GenerationJob>;

    /// Fetches the current state of a previously started operation.
    async fn get_operation(&self, job: &GenerationJob) -> PortResult<GenerationJob>;

    /// Downloads a finished artifact. The adapter attaches its own credential.
    async fn download(&self, uri: &str) -> PortResult<Bytes>;
}

/// Per-session key-value storage with the semantics of browser session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> PortResult<()>;
}

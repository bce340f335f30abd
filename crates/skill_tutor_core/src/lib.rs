pub mod cache;
pub mod domain;
pub mod error;
pub mod poller;
pub mod ports;
pub mod streaming;
pub mod tools;

pub use cache::{cache_key, ContentCache};
pub use domain::{
    AnimationRequest, AspectRatio, Citation, ContentBlock, GeneratedImage, GenerationJob,
    ImageSize, LearningModule, MediaInput, Sender, StreamChunk, StreamingMessage, SubPage, ToolId,
    VideoArtifact,
};
pub use error::StudioError;
pub use poller::{JobPoller, JobProgress, PollSettings};
pub use ports::{
    ChatService, ChatSession, ChunkStream, ImageGenerationService, MediaAnalysisService,
    ModuleGenerationService, PortError, PortResult, SessionStore, TextStreamService,
    TextToSpeechService, VideoGenerationService,
};
pub use streaming::{Conversation, DeltaStream, MessageDelta};

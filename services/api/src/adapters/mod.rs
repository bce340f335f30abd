pub mod analysis_llm;
pub mod chat_llm;
pub mod gemini;
pub mod image_llm;
pub mod module_llm;
pub mod session_store;
pub mod text_stream;
pub mod tts;
pub mod video_llm;

pub use analysis_llm::GeminiAnalysisAdapter;
pub use chat_llm::GeminiChatAdapter;
pub use gemini::GeminiClient;
pub use image_llm::GeminiImageAdapter;
pub use module_llm::GeminiModuleAdapter;
pub use session_store::InMemorySessionStore;
pub use text_stream::GeminiTextStreamAdapter;
pub use tts::GeminiTtsAdapter;
pub use video_llm::GeminiVideoAdapter;

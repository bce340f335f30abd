//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the grounded assistant chat.
//! It implements the `ChatService` and `ChatSession` ports from the `core` crate.
//!
//! The REST API is stateless, so each session keeps its own history and replays
//! it with every turn. A turn is only recorded once its reply stream has ended
//! cleanly; an abandoned or failed turn leaves the history untouched.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use skill_tutor_core::{ChatService, ChatSession, ChunkStream, PortResult};
use tokio::sync::Mutex;
use tracing::debug;

use super::gemini::{Content, GeminiClient, GenerateContentRequest, Part};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatService` with Google Search grounding enabled.
#[derive(Clone)]
pub struct GeminiChatAdapter {
    client: GeminiClient,
    model: String,
}

impl GeminiChatAdapter {
    /// Creates a new `GeminiChatAdapter`.
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl ChatService for GeminiChatAdapter {
    async fn start_chat(&self, system_instruction: &str) -> PortResult<Arc<dyn ChatSession>> {
        Ok(Arc::new(GeminiChatSession {
            client: self.client.clone(),
            model: self.model.clone(),
            system_instruction: system_instruction.to_string(),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

//=========================================================================================
// The Chat Session
//=========================================================================================

pub struct GeminiChatSession {
    client: GeminiClient,
    model: String,
    system_instruction: String,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiChatSession {
    fn request(&self, history: &[Content], user_turn: Content) -> GenerateContentRequest {
        let mut contents = history.to_vec();
        contents.push(user_turn);
        GenerateContentRequest {
            contents,
            system_instruction: Some(Content::system(self.system_instruction.clone())),
            tools: vec![json!({ "googleSearch": {} })],
            ..Default::default()
        }
    }
}

/// Passes chunks through and appends the exchange to `history` once `inner` is exhausted.
fn record_turn(
    mut inner: ChunkStream,
    history: Arc<Mutex<Vec<Content>>>,
    user_turn: Content,
) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut reply = String::new();
        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(text) = &chunk.text {
                        reply.push_str(text);
                    }
                    yield Ok(chunk);
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        let mut history = history.lock().await;
        history.push(user_turn);
        history.push(Content::model(reply));
    })
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send_message_stream(&self, message: &str) -> PortResult<ChunkStream> {
        let user_turn = Content::user(vec![Part::text(message)]);
        let request = {
            let history = self.history.lock().await;
            debug!(turns = history.len(), "Sending chat turn.");
            self.request(&history, user_turn.clone())
        };

        let inner = self
            .client
            .stream_generate_content(&self.model, &request)
            .await?;
        Ok(record_turn(inner, self.history.clone(), user_turn))
    }
}

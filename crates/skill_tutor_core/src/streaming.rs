//! crates/skill_tutor_core/src/streaming.rs
//!
//! Turns provider token streams into message deltas for live rendering, and
//! keeps the conversation state a chat page renders from.

use std::collections::HashSet;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{Citation, Sender, StreamingMessage};
use crate::error::StudioError;
use crate::ports::{ChatSession, ChunkStream, PortResult, TextStreamService};

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are AI Dost, a friendly and helpful AI assistant for students learning freelancer skills. Your answers should be encouraging, clear, and in Hinglish. You have access to Google Search, so use it for recent or specific topics.";
pub const CHAT_GREETING: &str = "Namaste! Main hoon AI Dost, ab Google Search ki shakti ke saath. Aapka koi bhi sawal ho, yahan pooch sakte hain.";
pub const CHAT_FAILURE_MESSAGE: &str = "Sorry, kuch gadbad ho gayi. Thodi der baad try karein.";

/// An incremental change to the message currently being streamed.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageDelta {
    /// Text to append, in arrival order.
    Text(String),
    /// Citations not seen earlier in this stream, in first-seen order.
    Sources(Vec<Citation>),
    /// The stream broke. Always the last delta.
    Failed(StudioError),
}

impl StreamingMessage {
    /// Applies a text or citation delta. `Failed` is left to the caller.
    pub fn push_delta(&mut self, delta: &MessageDelta) {
        match delta {
            MessageDelta::Text(text) => self.text.push_str(text),
            MessageDelta::Sources(sources) => {
                for source in sources {
                    if !self.sources.iter().any(|known| known.uri == source.uri) {
                        self.sources.push(source.clone());
                    }
                }
            }
            MessageDelta::Failed(_) => {}
        }
    }
}

/// A boxed stream of deltas.
pub type DeltaStream = Pin<Box<dyn Stream<Item = MessageDelta> + Send>>;

/// Lazily converts a provider stream into deltas.
///
/// The result is finite and single-use. It ends after the first error, or as
/// soon as `cancel` fires, dropping the provider stream either way.
pub fn consume(stream: ChunkStream, cancel: CancellationToken) -> DeltaStream {
    Box::pin(async_stream::stream! {
        let mut stream = stream;
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };
            let Some(next) = next else {
                info!("Stream consumer cancelled.");
                break;
            };

            match next {
                None => break,
                Some(Ok(chunk)) => {
                    if let Some(text) = chunk.text.filter(|text| !text.is_empty()) {
                        yield MessageDelta::Text(text);
                    }
                    let fresh: Vec<Citation> = chunk
                        .citations
                        .into_iter()
                        .filter(|c| !c.uri.is_empty() && !c.title.is_empty())
                        .filter(|c| seen.insert(c.uri.clone()))
                        .collect();
                    if !fresh.is_empty() {
                        yield MessageDelta::Sources(fresh);
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Stream failed mid-flight.");
                    yield MessageDelta::Failed(StudioError::from_port(e));
                    break;
                }
            }
        }
    })
}

/// Wraps the outcome of opening a provider stream. An opening failure becomes
/// a single `Failed` delta; `None` means the caller cancelled while opening.
fn from_opened(opened: Option<PortResult<ChunkStream>>, cancel: &CancellationToken) -> DeltaStream {
    let stream: ChunkStream = match opened {
        None => Box::pin(futures::stream::empty()),
        Some(Ok(stream)) => stream,
        Some(Err(e)) => Box::pin(futures::stream::once(async move { Err(e) })),
    };
    consume(stream, cancel.clone())
}

/// Sends one chat turn and returns the reply as deltas.
pub async fn open_reply(
    session: &dyn ChatSession,
    message: &str,
    cancel: &CancellationToken,
) -> DeltaStream {
    info!("Opening chat reply stream.");
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = session.send_message_stream(message) => Some(result),
    };
    from_opened(opened, cancel)
}

/// Starts a plain completion stream. Blank prompts are rejected before any network call.
pub async fn open_completion(
    service: &dyn TextStreamService,
    prompt: &str,
    cancel: &CancellationToken,
) -> Result<DeltaStream, StudioError> {
    if prompt.trim().is_empty() {
        return Err(StudioError::Validation("Kripya ek prompt likhein.".to_string()));
    }
    info!("Opening completion stream.");
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = service.stream_text(prompt) => Some(result),
    };
    Ok(from_opened(opened, cancel))
}

/// Drives one chat turn end to end, passing every delta to `on_delta` after
/// it has been applied. The conversation is ready for the next send afterwards,
/// whether the reply finished, failed or was cancelled.
pub async fn stream_reply<F>(
    conversation: &mut Conversation,
    session: &dyn ChatSession,
    text: &str,
    cancel: &CancellationToken,
    mut on_delta: F,
) -> Result<(), StudioError>
where
    F: FnMut(&MessageDelta) + Send,
{
    conversation.begin_send(text)?;
    let mut deltas = open_reply(session, text, cancel).await;
    while let Some(delta) = deltas.next().await {
        conversation.apply(&delta);
        on_delta(&delta);
    }
    conversation.finish();
    Ok(())
}

/// Streams a completion and returns the accumulated text.
///
/// A stream failure is returned as-is instead of being replaced by a canned
/// message. Cancellation returns whatever arrived before it.
pub async fn stream_completion<F>(
    service: &dyn TextStreamService,
    prompt: &str,
    cancel: &CancellationToken,
    mut on_delta: F,
) -> Result<String, StudioError>
where
    F: FnMut(&MessageDelta) + Send,
{
    let mut deltas = open_completion(service, prompt, cancel).await?;
    let mut text = String::new();
    while let Some(delta) = deltas.next().await {
        match &delta {
            MessageDelta::Text(fragment) => text.push_str(fragment),
            MessageDelta::Sources(_) => {}
            MessageDelta::Failed(err) => return Err(err.clone()),
        }
        on_delta(&delta);
    }
    Ok(text)
}

//=========================================================================================
// Conversation State
//=========================================================================================

/// The ordered messages of one chat, with at most one reply streaming at a time.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<StreamingMessage>,
    is_streaming: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: &str) -> Self {
        Self {
            messages: vec![StreamingMessage::bot(greeting)],
            is_streaming: false,
        }
    }

    pub fn messages(&self) -> &[StreamingMessage] {
        &self.messages
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Records the user's message and an empty bot placeholder for the reply.
    pub fn begin_send(&mut self, text: &str) -> Result<(), StudioError> {
        if self.is_streaming {
            return Err(StudioError::Busy);
        }
        if text.trim().is_empty() {
            return Err(StudioError::Validation("Kripya apna sawal likhein.".to_string()));
        }
        self.messages.push(StreamingMessage::user(text));
        self.messages.push(StreamingMessage::bot(""));
        self.is_streaming = true;
        Ok(())
    }

    /// Applies a delta to the placeholder. Ignored once the reply has finished.
    pub fn apply(&mut self, delta: &MessageDelta) {
        if !self.is_streaming {
            return;
        }
        let Some(placeholder) = self
            .messages
            .last_mut()
            .filter(|message| message.sender == Sender::Bot)
        else {
            return;
        };
        match delta {
            MessageDelta::Failed(_) => *placeholder = StreamingMessage::bot(CHAT_FAILURE_MESSAGE),
            other => placeholder.push_delta(other),
        }
    }

    pub fn finish(&mut self) {
        self.is_streaming = false;
    }
}

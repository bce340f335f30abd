//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the chat assistant, the quick content writer, and the image animator.

use serde::{Deserialize, Serialize};
use skill_tutor_core::{AspectRatio, Citation, JobProgress, StreamingMessage, StudioError};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sends one user turn to the assistant chat.
    Chat { message: String },

    /// Asks the quick content writer to stream a completion.
    Write { prompt: String },

    /// Starts animating a still image into a short video.
    Animate {
        prompt: String,
        aspect_ratio: AspectRatio,
        image_base64: String,
        mime_type: String,
    },

    /// Cancels whatever task is currently streaming.
    Cancel,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// NOTE: A finished video is sent as one Binary frame immediately after `VideoReady`.
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once per connection with the assistant's opening message.
    ChatReady { greeting: String },

    /// A fragment of the reply being streamed.
    ChatDelta {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        sources: Vec<Citation>,
    },

    /// The reply stream broke. The client should show `message` in place of the reply.
    ChatFailed { message: String, kind: String },

    /// The reply is complete (or was cancelled) and the chat accepts a new message.
    ChatEnded {
        reply: Option<StreamingMessage>,
        cancelled: bool,
    },

    WriteDelta { text: String },

    WriteEnded { cancelled: bool },

    /// A stage change or per-check progress report from the animator.
    Progress {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        percent: Option<f64>,
    },

    /// The video is ready. The next frame is binary and carries `size` bytes.
    VideoReady { mime_type: String, size: usize },

    /// Reports a classified failure the client should display.
    Error {
        message: String,
        kind: String,
        retryable: bool,
    },
}

impl ServerMessage {
    pub fn error(err: &StudioError) -> Self {
        ServerMessage::Error {
            message: err.user_message(),
            kind: err.kind().to_string(),
            retryable: err.is_retryable(),
        }
    }

    pub fn stage(message: &str) -> Self {
        ServerMessage::Progress {
            message: message.to_string(),
            percent: None,
        }
    }

    pub fn progress(progress: JobProgress) -> Self {
        ServerMessage::Progress {
            message: progress.message,
            percent: Some(progress.percent),
        }
    }
}

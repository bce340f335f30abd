//! services/api/src/web/chat_task.rs
//!
//! The worker for one assistant chat turn: streams the reply to the client
//! while keeping the connection's conversation up to date.

use crate::{
    error::ApiError,
    web::{
        protocol::ServerMessage,
        state::ConnectionState,
        ws_handler::{send_server_message, FrameSink, WsSender},
    },
};
use futures::StreamExt;
use skill_tutor_core::streaming::{open_reply, CHAT_FAILURE_MESSAGE};
use skill_tutor_core::MessageDelta;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Streams the reply to `message`. The caller has already run `begin_send`.
///
/// Ends with `ChatEnded` whether the stream finished, failed or was cancelled,
/// and always leaves the conversation ready for the next send.
pub async fn chat_process<S: FrameSink>(
    connection: Arc<Mutex<ConnectionState>>,
    ws_sender: WsSender<S>,
    message: String,
    cancellation_token: CancellationToken,
) -> Result<(), ApiError> {
    let chat = connection.lock().await.chat.clone();
    let mut deltas = open_reply(chat.as_ref(), &message, &cancellation_token).await;

    while let Some(delta) = deltas.next().await {
        connection.lock().await.conversation.apply(&delta);
        let outgoing = match delta {
            MessageDelta::Text(text) => ServerMessage::ChatDelta {
                text: Some(text),
                sources: Vec::new(),
            },
            MessageDelta::Sources(sources) => ServerMessage::ChatDelta { text: None, sources },
            MessageDelta::Failed(err) => {
                warn!(error = %err, "Chat reply stream failed.");
                ServerMessage::ChatFailed {
                    message: CHAT_FAILURE_MESSAGE.to_string(),
                    kind: err.kind().to_string(),
                }
            }
        };
        send_server_message(&ws_sender, &outgoing).await?;
    }

    let reply = {
        let mut connection = connection.lock().await;
        connection.conversation.finish();
        connection.conversation.messages().last().cloned()
    };
    let cancelled = cancellation_token.is_cancelled();
    info!(cancelled, "Chat turn finished.");
    let sent = send_server_message(&ws_sender, &ServerMessage::ChatEnded { reply, cancelled }).await;
    connection.lock().await.finish_task();
    sent
}

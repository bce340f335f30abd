//! services/api/src/web/write_task.rs
//!
//! The worker for the quick content writer.

use crate::{
    error::ApiError,
    web::{
        protocol::ServerMessage,
        state::ConnectionState,
        ws_handler::{send_server_message, FrameSink, WsSender},
    },
};
use skill_tutor_core::streaming::stream_completion;
use skill_tutor_core::{MessageDelta, TextStreamService};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Streams a completion for `prompt` as `WriteDelta` messages, then `WriteEnded`.
/// A failure is reported with an `Error` message before `WriteEnded`.
pub async fn write_process<S: FrameSink>(
    service: Arc<dyn TextStreamService>,
    connection: Arc<Mutex<ConnectionState>>,
    ws_sender: WsSender<S>,
    prompt: String,
    cancellation_token: CancellationToken,
) -> Result<(), ApiError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let result = {
        let work = stream_completion(
            service.as_ref(),
            &prompt,
            &cancellation_token,
            |delta| {
                if let MessageDelta::Text(text) = delta {
                    let _ = tx.send(text.clone());
                }
            },
        );
        tokio::pin!(work);

        loop {
            tokio::select! {
                result = &mut work => break result,
                Some(text) = rx.recv() => {
                    send_server_message(&ws_sender, &ServerMessage::WriteDelta { text }).await?
                }
            }
        }
    };
    while let Ok(text) = rx.try_recv() {
        send_server_message(&ws_sender, &ServerMessage::WriteDelta { text }).await?;
    }

    match result {
        Ok(text) => info!(chars = text.chars().count(), "Completion finished."),
        Err(err) => {
            warn!(error = %err, "Completion failed.");
            send_server_message(&ws_sender, &ServerMessage::error(&err)).await?;
        }
    }

    let cancelled = cancellation_token.is_cancelled();
    send_server_message(&ws_sender, &ServerMessage::WriteEnded { cancelled }).await?;
    connection.lock().await.finish_task();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::state::ConnectionMode;
    use crate::web::testing::RecordingSink;
    use async_trait::async_trait;
    use skill_tutor_core::{ChatSession, ChunkStream, PortError, PortResult, StreamChunk};

    struct NoChat;

    #[async_trait]
    impl ChatSession for NoChat {
        async fn send_message_stream(&self, _message: &str) -> PortResult<ChunkStream> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    struct BrokenWriter;

    #[async_trait]
    impl TextStreamService for BrokenWriter {
        async fn stream_text(&self, _prompt: &str) -> PortResult<ChunkStream> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok(StreamChunk::text("Aaj ka ")),
                Err(PortError::Upstream("503 UNAVAILABLE: overloaded".into())),
            ])))
        }
    }

    #[tokio::test]
    async fn write_ended_goes_out_before_the_connection_is_released() {
        let connection = Arc::new(Mutex::new(ConnectionState::new(Arc::new(NoChat))));
        let token = connection.lock().await.start_task(ConnectionMode::Writing);
        let sink = RecordingSink::shared(connection.clone());

        write_process(Arc::new(BrokenWriter), connection.clone(), sink.clone(), "caption".into(), token)
            .await
            .unwrap();

        let frames = sink.lock().await.frames.clone();
        let kinds: Vec<&str> = frames
            .iter()
            .map(|f| {
                if f.text.contains(r#""type":"write_delta""#) {
                    "delta"
                } else if f.text.contains(r#""type":"error""#) {
                    "error"
                } else if f.text.contains(r#""type":"write_ended""#) {
                    "ended"
                } else {
                    "other"
                }
            })
            .collect();
        assert_eq!(kinds, vec!["delta", "error", "ended"]);
        assert!(frames.iter().all(|f| f.mode == Some(ConnectionMode::Writing)));
        assert_eq!(connection.lock().await.mode, ConnectionMode::Idle);
    }
}

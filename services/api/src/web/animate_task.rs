//! services/api/src/web/animate_task.rs
//!
//! The worker for the image animator. Runs one long-running video job to
//! completion, relaying the poller's stage and progress reports as they happen.

use crate::{
    error::ApiError,
    web::{
        protocol::ServerMessage,
        state::ConnectionState,
        ws_handler::{send_server_message, FrameSink, WsSender},
    },
};
use axum::extract::ws::Message;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::SinkExt;
use skill_tutor_core::{AnimationRequest, AspectRatio, JobPoller, MediaInput, StudioError};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Decodes the uploaded image. Bad base64 is reported like a missing image.
pub fn build_request(
    prompt: String,
    aspect_ratio: AspectRatio,
    image_base64: &str,
    mime_type: String,
) -> Result<AnimationRequest, StudioError> {
    let data = STANDARD
        .decode(image_base64.as_bytes())
        .map_err(|_| StudioError::Validation("Image padhi nahi ja saki. Kripya dobara upload karein.".to_string()))?;
    Ok(AnimationRequest {
        prompt,
        image: MediaInput {
            mime_type,
            data: Bytes::from(data),
        },
        aspect_ratio,
    })
}

/// Runs one animation and sends `VideoReady` plus the binary video, or an `Error`.
pub async fn animate_process<S: FrameSink>(
    poller: Arc<JobPoller>,
    connection: Arc<Mutex<ConnectionState>>,
    ws_sender: WsSender<S>,
    request: AnimationRequest,
    cancellation_token: CancellationToken,
) -> Result<(), ApiError> {
    // The poller reports synchronously; the channel lets this task forward
    // reports to the socket while the job is still running.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let result = {
        let work = poller.animate(
            &request,
            |stage| {
                let _ = tx.send(ServerMessage::stage(stage));
            },
            |progress| {
                let _ = tx.send(ServerMessage::progress(progress));
            },
            &cancellation_token,
        );
        tokio::pin!(work);

        loop {
            tokio::select! {
                result = &mut work => break result,
                Some(message) = rx.recv() => send_server_message(&ws_sender, &message).await?,
            }
        }
    };
    while let Ok(message) = rx.try_recv() {
        send_server_message(&ws_sender, &message).await?;
    }

    let sent = match result {
        Ok(artifact) => {
            info!(size = artifact.bytes.len(), "Sending finished video.");
            let ready = ServerMessage::VideoReady {
                mime_type: artifact.mime_type.clone(),
                size: artifact.bytes.len(),
            };
            let ready_json = serde_json::to_string(&ready)
                .map_err(|e| ApiError::Internal(format!("Failed to encode message: {}", e)))?;
            // Both frames go out under one lock so nothing can land between them.
            let mut sender = ws_sender.lock().await;
            sender.send(Message::Text(ready_json.into())).await?;
            sender.send(Message::Binary(artifact.bytes)).await?;
            Ok(())
        }
        Err(err) => {
            if !matches!(err, StudioError::Cancelled) {
                error!(error = %err, "Animation failed.");
            }
            send_server_message(&ws_sender, &ServerMessage::error(&err)).await
        }
    };
    connection.lock().await.finish_task();
    sent
}

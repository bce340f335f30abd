//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It owns the connection's state and starts one streaming task at a time.

use crate::{
    error::ApiError,
    web::{
        animate_task::{animate_process, build_request},
        chat_task::chat_process,
        protocol::{ClientMessage, ServerMessage},
        state::{AppState, BrowserSession, ConnectionMode, ConnectionState},
        write_task::write_process,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    Sink, SinkExt,
};
use skill_tutor_core::streaming::{CHAT_GREETING, CHAT_SYSTEM_INSTRUCTION};
use skill_tutor_core::StudioError;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};

/// Anything a task can push WebSocket frames into.
pub trait FrameSink: Sink<Message, Error = axum::Error> + Unpin + Send {}

impl<T> FrameSink for T where T: Sink<Message, Error = axum::Error> + Unpin + Send {}

/// The sending half of a socket, shared between the control loop and its task.
pub type WsSender<S = SplitSink<WebSocket, Message>> = Arc<Mutex<S>>;

/// Serializes `message` and sends it as one text frame.
pub async fn send_server_message<S: FrameSink>(
    ws_sender: &WsSender<S>,
    message: &ServerMessage,
) -> Result<(), ApiError> {
    let json = serde_json::to_string(message)
        .map_err(|e| ApiError::Internal(format!("Failed to encode message: {}", e)))?;
    ws_sender.lock().await.send(Message::Text(json.into())).await?;
    Ok(())
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, session))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, session: Arc<BrowserSession>) {
    info!(session_id = %session.id, "New WebSocket connection established.");

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let chat = match app_state.chat_adapter.start_chat(CHAT_SYSTEM_INSTRUCTION).await {
        Ok(chat) => chat,
        Err(e) => {
            error!("Failed to start chat session: {:?}", e);
            let _ = send_server_message(&ws_sender, &ServerMessage::error(&StudioError::from_port(e))).await;
            return;
        }
    };
    let connection = Arc::new(Mutex::new(ConnectionState::new(chat)));

    let ready = ServerMessage::ChatReady {
        greeting: CHAT_GREETING.to_string(),
    };
    if send_server_message(&ws_sender, &ready).await.is_err() {
        error!("Failed to send chat greeting.");
        return;
    }

    // --- 2. Main Message Loop ---
    let mut task_handle: Option<JoinHandle<()>> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(text.as_str(), &app_state, &connection, &ws_sender, &mut task_handle)
                    .await;
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 3. Cleanup ---
    connection.lock().await.cancellation_token.cancel();
    if let Some(handle) = task_handle {
        handle.abort();
    }
    info!(session_id = %session.id, "WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    connection: &Arc<Mutex<ConnectionState>>,
    ws_sender: &WsSender,
    task_handle: &mut Option<JoinHandle<()>>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => client_msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    if let ClientMessage::Cancel = client_msg {
        let connection = connection.lock().await;
        info!(mode = ?connection.mode, "Cancel message received.");
        connection.cancellation_token.cancel();
        return;
    }

    let mut state = connection.lock().await;
    if let Err(e) = state.ensure_idle() {
        drop(state);
        reject(ws_sender, &e).await;
        return;
    }

    let task = match client_msg {
        ClientMessage::Chat { message } => {
            if let Err(e) = state.conversation.begin_send(&message) {
                drop(state);
                reject(ws_sender, &e).await;
                return;
            }
            let token = state.start_task(ConnectionMode::Chatting);
            let connection = connection.clone();
            let ws_sender = ws_sender.clone();
            tokio::spawn(async move {
                if let Err(e) = chat_process(connection.clone(), ws_sender, message, token).await {
                    error!("Chat task failed: {:?}", e);
                    release(&connection).await;
                }
            })
        }
        ClientMessage::Write { prompt } => {
            let token = state.start_task(ConnectionMode::Writing);
            let app_state = app_state.clone();
            let connection = connection.clone();
            let ws_sender = ws_sender.clone();
            tokio::spawn(async move {
                let service = app_state.text_stream_adapter.clone();
                if let Err(e) = write_process(service, connection.clone(), ws_sender, prompt, token).await {
                    error!("Write task failed: {:?}", e);
                    release(&connection).await;
                }
            })
        }
        ClientMessage::Animate {
            prompt,
            aspect_ratio,
            image_base64,
            mime_type,
        } => {
            let request = match build_request(prompt, aspect_ratio, &image_base64, mime_type) {
                Ok(request) => request,
                Err(e) => {
                    drop(state);
                    reject(ws_sender, &e).await;
                    return;
                }
            };
            let token = state.start_task(ConnectionMode::Animating);
            let app_state = app_state.clone();
            let connection = connection.clone();
            let ws_sender = ws_sender.clone();
            tokio::spawn(async move {
                let poller = app_state.poller.clone();
                if let Err(e) = animate_process(poller, connection.clone(), ws_sender, request, token).await {
                    error!("Animate task failed: {:?}", e);
                    release(&connection).await;
                }
            })
        }
        ClientMessage::Cancel => return,
    };
    *task_handle = Some(task);
}

async fn reject(ws_sender: &WsSender, err: &StudioError) {
    if let Err(e) = send_server_message(ws_sender, &ServerMessage::error(err)).await {
        error!("Failed to send error message: {:?}", e);
    }
}

/// Returns the connection to idle after a task died without finishing.
async fn release(connection: &Arc<Mutex<ConnectionState>>) {
    let mut state = connection.lock().await;
    state.conversation.finish();
    state.finish_task();
}

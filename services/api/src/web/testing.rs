//! services/api/src/web/testing.rs
//!
//! A fake socket for the task tests.

use crate::web::state::{ConnectionMode, ConnectionState};
use axum::extract::ws::Message;
use futures::Sink;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Frame {
    pub text: String,
    /// The connection's mode when the frame was sent. `None` if it was locked.
    pub mode: Option<ConnectionMode>,
}

/// Records every frame along with the connection's mode at send time.
pub struct RecordingSink {
    connection: Arc<Mutex<ConnectionState>>,
    pub frames: Vec<Frame>,
}

impl RecordingSink {
    pub fn shared(connection: Arc<Mutex<ConnectionState>>) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            connection,
            frames: Vec::new(),
        }))
    }
}

impl Sink<Message> for RecordingSink {
    type Error = axum::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        let this = self.get_mut();
        let mode = this.connection.try_lock().ok().map(|state| state.mode);
        let text = match item {
            Message::Text(text) => text.as_str().to_string(),
            Message::Binary(bytes) => format!("<{} bytes>", bytes.len()),
            _ => String::new(),
        };
        this.frames.push(Frame { text, mode });
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

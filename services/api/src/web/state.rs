//! services/api/src/web/state.rs
//!
//! Defines the application's shared, per-browser-session, and per-connection states.

use crate::adapters::InMemorySessionStore;
use chrono::{DateTime, Utc};
use skill_tutor_core::streaming::CHAT_GREETING;
use skill_tutor_core::{
    ChatService, ChatSession, ContentCache, Conversation, ImageGenerationService, JobPoller,
    MediaAnalysisService, ModuleGenerationService, StudioError, TextStreamService,
    TextToSpeechService,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub analysis_adapter: Arc<dyn MediaAnalysisService>,
    pub image_adapter: Arc<dyn ImageGenerationService>,
    pub tts_adapter: Arc<dyn TextToSpeechService>,
    pub text_stream_adapter: Arc<dyn TextStreamService>,
    pub chat_adapter: Arc<dyn ChatService>,
    pub poller: Arc<JobPoller>,
}

//=========================================================================================
// Browser Sessions
//=========================================================================================

/// The server-side counterpart of one browser tab's session storage.
pub struct BrowserSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub cache: ContentCache,
    last_seen: StdMutex<Instant>,
}

impl BrowserSession {
    fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .map(|last_seen| last_seen.elapsed())
            .unwrap_or_default()
    }
}

/// Bounds on how much session state the server keeps around.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Storage quota of each session, in bytes.
    pub quota_bytes: usize,
    /// A session unused for this long is dropped.
    pub idle_timeout: Duration,
    /// Opening a session past this count evicts the least recently used one.
    pub max_sessions: usize,
}

/// Every live browser session, keyed by the id carried in the session cookie.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<BrowserSession>>>,
    generator: Arc<dyn ModuleGenerationService>,
    limits: SessionLimits,
}

impl SessionRegistry {
    pub fn new(generator: Arc<dyn ModuleGenerationService>, limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            generator,
            limits,
        }
    }

    /// Opens a session with its own empty storage and content cache.
    pub async fn create(&self) -> Arc<BrowserSession> {
        let store = Arc::new(InMemorySessionStore::new(self.limits.quota_bytes));
        let session = Arc::new(BrowserSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            cache: ContentCache::new(store, self.generator.clone()),
            last_seen: StdMutex::new(Instant::now()),
        });

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.limits.max_sessions {
            let idle_timeout = self.limits.idle_timeout;
            sessions.retain(|_, s| s.idle_for() < idle_timeout);
        }
        while sessions.len() >= self.limits.max_sessions {
            let oldest = sessions
                .values()
                .max_by_key(|s| s.idle_for())
                .map(|s| s.id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    info!(session_id = %id, "Evicted the least recently used session.");
                }
                None => break,
            }
        }
        sessions.insert(session.id, session.clone());
        info!(session_id = %session.id, live = sessions.len(), "Browser session opened.");
        session
    }

    /// Returns the session still behind `cookie_id`, or opens a new one.
    /// The flag is true when a session was created.
    pub async fn resume_or_create(&self, cookie_id: Option<Uuid>) -> (Arc<BrowserSession>, bool) {
        if let Some(id) = cookie_id {
            if let Some(session) = self.get(id).await {
                return (session, false);
            }
        }
        (self.create().await, true)
    }

    /// Looks up a live session and marks it as used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<BrowserSession>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        if session.idle_for() >= self.limits.idle_timeout {
            return None;
        }
        session.touch();
        Some(session)
    }

    /// Ends a session, discarding everything it cached. Returns false if it was unknown.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Browser session closed.");
        }
        removed
    }

    /// Drops every session idle past the timeout. Returns how many were dropped.
    pub async fn sweep_idle(&self) -> usize {
        let idle_timeout = self.limits.idle_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_for() < idle_timeout);
        let dropped = before - sessions.len();
        if dropped > 0 {
            info!(dropped, live = sessions.len(), "Expired idle browser sessions.");
        }
        dropped
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

//=========================================================================================
// ConnectionState (Specific to One WebSocket Connection)
//=========================================================================================

/// An enum representing which streaming task, if any, the connection is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Idle,
    Chatting,
    Writing,
    Animating,
}

/// The state for a single, active WebSocket connection.
pub struct ConnectionState {
    pub conversation: Conversation,
    pub chat: Arc<dyn ChatSession>,
    pub mode: ConnectionMode,
    /// A token to cancel the current streaming task. Replaced for every new task.
    pub cancellation_token: CancellationToken,
}

impl ConnectionState {
    pub fn new(chat: Arc<dyn ChatSession>) -> Self {
        Self {
            conversation: Conversation::with_greeting(CHAT_GREETING),
            chat,
            mode: ConnectionMode::Idle,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Fails with `Busy` while another task still owns the connection.
    pub fn ensure_idle(&self) -> Result<(), StudioError> {
        if self.mode == ConnectionMode::Idle {
            Ok(())
        } else {
            Err(StudioError::Busy)
        }
    }

    /// Claims the connection for a new task and hands back that task's token.
    /// Callers check `ensure_idle` first, under the same lock.
    pub fn start_task(&mut self, mode: ConnectionMode) -> CancellationToken {
        self.mode = mode;
        self.cancellation_token = CancellationToken::new();
        self.cancellation_token.clone()
    }

    /// Returns the connection to idle once a task has sent its last message.
    pub fn finish_task(&mut self) {
        self.mode = ConnectionMode::Idle;
    }
}

//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use skill_tutor_core::PollSettings;
use tracing::Level;

use crate::adapters::gemini::DEFAULT_BASE_URL;
use crate::web::state::SessionLimits;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub allowed_origin: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub content_model: String,
    pub analysis_model: String,
    pub image_model: String,
    pub fast_text_model: String,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub video_model: String,
    pub video_poll_interval: Duration,
    pub video_max_poll_attempts: u32,
    pub session_storage_quota_bytes: usize,
    pub session_idle_timeout: Duration,
    pub max_sessions: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address = parse_var(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;

        let log_level_str = text("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = text("ALLOWED_ORIGIN", "http://localhost:5173");

        // --- API Credential ---
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        // --- Adapter-specific Settings ---
        let gemini_base_url = text("GEMINI_BASE_URL", DEFAULT_BASE_URL);
        let content_model = text("CONTENT_MODEL", "gemini-3-flash-preview");
        let analysis_model = text("ANALYSIS_MODEL", "gemini-3-pro-preview");
        let image_model = text("IMAGE_MODEL", "gemini-3-pro-image-preview");
        let fast_text_model = text("FAST_TEXT_MODEL", "gemini-2.5-flash-lite-latest");
        let chat_model = text("CHAT_MODEL", "gemini-3-flash-preview");
        let tts_model = text("TTS_MODEL", "gemini-2.5-flash-preview-tts");
        let tts_voice = text("TTS_VOICE", "Kore");
        let video_model = text("VIDEO_MODEL", "veo-3.1-fast-generate-preview");

        let interval_secs: u64 = parse_positive(&lookup, "VIDEO_POLL_INTERVAL_SECS", "10")?;
        let video_max_poll_attempts = parse_positive(&lookup, "VIDEO_MAX_POLL_ATTEMPTS", "60")?;

        // --- Browser Sessions ---
        let session_storage_quota_bytes =
            parse_var(&lookup, "SESSION_STORAGE_QUOTA_BYTES", "5242880")?;
        let idle_secs: u64 = parse_positive(&lookup, "SESSION_IDLE_TIMEOUT_SECS", "3600")?;
        let max_sessions = parse_positive(&lookup, "MAX_SESSIONS", "1000")?;

        Ok(Self {
            bind_address,
            log_level,
            allowed_origin,
            gemini_api_key,
            gemini_base_url,
            content_model,
            analysis_model,
            image_model,
            fast_text_model,
            chat_model,
            tts_model,
            tts_voice,
            video_model,
            video_poll_interval: Duration::from_secs(interval_secs),
            video_max_poll_attempts,
            session_storage_quota_bytes,
            session_idle_timeout: Duration::from_secs(idle_secs),
            max_sessions,
        })
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.video_poll_interval,
            max_attempts: self.video_max_poll_attempts,
        }
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            quota_bytes: self.session_storage_quota_bytes,
            idle_timeout: self.session_idle_timeout,
            max_sessions: self.max_sessions,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

/// Like `parse_var`, but zero is rejected.
fn parse_positive<T, F>(lookup: &F, name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let value: T = parse_var(lookup, name, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

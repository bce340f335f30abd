//! crates/skill_tutor_core/src/error.rs
//!
//! The error taxonomy surfaced by the engines to the web layer.

use crate::ports::PortError;

/// The provider message that means the configured credential no longer
/// resolves to a usable project or key.
pub const INVALID_CREDENTIAL_SIGNATURE: &str = "Requested entity was not found";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StudioError {
    /// Required user input was missing. Raised before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The generation API failed. Carries the upstream message.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The provider rejected the credential; the user should pick a new key.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// A job finished but reported no result reference.
    #[error("Generation finished but no artifact was returned")]
    ArtifactMissing,

    /// Generation succeeded transport-wise but the module is empty or invalid.
    #[error("Content generation failed: {0}")]
    ContentGeneration(String),

    #[error("Gave up waiting after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Cancelled")]
    Cancelled,

    /// A response is still streaming in this conversation.
    #[error("A response is already streaming")]
    Busy,
}

impl StudioError {
    /// Classifies an upstream failure. Refused credentials and the credential
    /// signature are remapped so the UI can prompt for re-authentication;
    /// everything else passes through.
    pub fn from_port(err: PortError) -> Self {
        match err {
            PortError::Unauthorized(message) => StudioError::InvalidCredential(message),
            other => {
                let message = other.to_string();
                if message.contains(INVALID_CREDENTIAL_SIGNATURE) {
                    StudioError::InvalidCredential(message)
                } else {
                    StudioError::Generation(message)
                }
            }
        }
    }

    /// A short machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::Validation(_) => "validation",
            StudioError::Generation(_) => "generation",
            StudioError::InvalidCredential(_) => "invalid_credential",
            StudioError::ArtifactMissing => "artifact_missing",
            StudioError::ContentGeneration(_) => "content_generation",
            StudioError::Timeout { .. } => "timeout",
            StudioError::Cancelled => "cancelled",
            StudioError::Busy => "busy",
        }
    }

    /// Whether the UI should offer a retry button.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            StudioError::Validation(_) | StudioError::InvalidCredential(_) | StudioError::Busy
        )
    }

    /// The localized text shown to the learner.
    pub fn user_message(&self) -> String {
        match self {
            StudioError::Validation(msg) => msg.clone(),
            StudioError::Generation(msg) => format!("Kuch gadbad ho gayi: {}", msg),
            StudioError::InvalidCredential(_) => {
                "API key sahi nahi lag rahi. Kripya apni API key dobara select karein.".to_string()
            }
            StudioError::ArtifactMissing => "Video generate ho gayi, par link nahi mila.".to_string(),
            StudioError::ContentGeneration(_) => {
                "Content generate nahi ho paaya. Kripya dobara try karein.".to_string()
            }
            StudioError::Timeout { .. } => {
                "Video banne mein bahut time lag raha hai. Thodi der baad try karein.".to_string()
            }
            StudioError::Cancelled => "Request cancel ho gayi.".to_string(),
            StudioError::Busy => "Pehle wala jawab abhi aa raha hai, thoda ruko.".to_string(),
        }
    }
}

impl From<PortError> for StudioError {
    fn from(err: PortError) -> Self {
        StudioError::from_port(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_not_found_is_remapped_to_invalid_credential() {
        let err = StudioError::from_port(PortError::Upstream(
            "404 NOT_FOUND: Requested entity was not found.".into(),
        ));
        assert!(matches!(err, StudioError::InvalidCredential(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn refused_credentials_are_not_retryable() {
        let err = StudioError::from_port(PortError::Unauthorized(
            "403 PERMISSION_DENIED: API key not valid.".into(),
        ));
        assert_eq!(
            err,
            StudioError::InvalidCredential("403 PERMISSION_DENIED: API key not valid.".into())
        );
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "invalid_credential");
    }

    #[test]
    fn other_upstream_messages_pass_through() {
        let err = StudioError::from_port(PortError::Upstream("quota exhausted".into()));
        assert_eq!(err, StudioError::Generation("quota exhausted".into()));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "generation");
    }
}

//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::tts::{pcm16_to_wav, SPEECH_SAMPLE_RATE};
use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::state::{AppState, BrowserSession};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skill_tutor_core::{tools, ImageSize, MediaInput, StudioError};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        delete_session_handler,
        module_handler,
        analyze_image_handler,
        analyze_video_handler,
        generate_image_handler,
        speech_handler,
    ),
    components(
        schemas(
            CreateSessionResponse,
            ErrorBody,
            AnalysisResponse,
            GenerateImageRequest,
            GeneratedImageResponse,
            SpeechRequest
        )
    ),
    tags(
        (name = "Skill Tutor API", description = "Learning modules and AI studio tools for freelance skills.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after successfully opening a browser session.
#[derive(Serialize, ToSchema)]
pub struct CreateSessionResponse {
    session_id: Uuid,
    created_at: DateTime<Utc>,
}

/// The body of every failed request.
#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorBody {
    message: String,
    kind: String,
    retryable: bool,
}

#[derive(Serialize, ToSchema)]
pub struct AnalysisResponse {
    answer: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateImageRequest {
    prompt: String,
    /// One of `1K`, `2K` or `4K`.
    #[schema(value_type = String, example = "1K")]
    size: ImageSize,
}

#[derive(Serialize, ToSchema)]
pub struct GeneratedImageResponse {
    mime_type: String,
    image_base64: String,
    alt_text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SpeechRequest {
    text: String,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type RestError = (StatusCode, Json<ErrorBody>);

/// The HTTP status for a classified studio failure.
pub fn status_for(err: &StudioError) -> StatusCode {
    match err {
        StudioError::Validation(_) => StatusCode::BAD_REQUEST,
        StudioError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
        StudioError::Busy => StatusCode::CONFLICT,
        StudioError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        StudioError::Generation(_)
        | StudioError::ArtifactMissing
        | StudioError::ContentGeneration(_)
        | StudioError::Cancelled => StatusCode::BAD_GATEWAY,
    }
}

fn studio_failure(err: StudioError) -> RestError {
    if !matches!(err, StudioError::Validation(_)) {
        error!(error = %err, kind = err.kind(), "Request failed.");
    }
    (
        status_for(&err),
        Json(ErrorBody {
            message: err.user_message(),
            kind: err.kind().to_string(),
            retryable: err.is_retryable(),
        }),
    )
}

fn bad_request(message: String) -> RestError {
    studio_failure(StudioError::Validation(message))
}

fn internal(message: String) -> RestError {
    error!("{}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            message,
            kind: "internal".to_string(),
            retryable: true,
        }),
    )
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Open a browser session, or resume the one named by the session cookie.
///
/// Sets the session cookie. Generated modules are cached per session until it is
/// deleted or sits idle past the configured timeout.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 200, description = "The cookie's session is still live and was resumed", body = CreateSessionResponse),
        (status = 201, description = "Session created successfully", body = CreateSessionResponse)
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (session, created) = app_state
        .sessions
        .resume_or_create(session_id_from_headers(&headers))
        .await;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session.id);
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(CreateSessionResponse {
            session_id: session.id,
            created_at: session.created_at,
        }),
    )
}

/// End the current browser session and discard its cached modules.
#[utoipa::path(
    delete,
    path = "/sessions/current",
    responses(
        (status = 204, description = "Session deleted"),
        (status = 401, description = "Missing or unknown session cookie")
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<BrowserSession>>,
) -> impl IntoResponse {
    app_state.sessions.remove(session.id).await;
    let cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

//=========================================================================================
// Learning Module Handler
//=========================================================================================

/// Get the learning module for a skill, generating it on the first request of a session.
#[utoipa::path(
    get,
    path = "/skills/{name}/module",
    params(("name" = String, Path, description = "The skill to learn, e.g. `Graphic Design`.")),
    responses(
        (status = 200, description = "The learning module as JSON"),
        (status = 401, description = "Missing or unknown session cookie"),
        (status = 502, description = "The module could not be generated", body = ErrorBody)
    )
)]
pub async fn module_handler(
    Extension(session): Extension<Arc<BrowserSession>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, RestError> {
    info!(session_id = %session.id, skill = %name, "Learning module requested.");
    let module = session.cache.fetch_or_generate(&name).await.map_err(studio_failure)?;
    Ok(Json(module))
}

//=========================================================================================
// Studio Tool Handlers
//=========================================================================================

/// Reads the `prompt` and `file` parts of a tool upload. A missing file yields empty media.
async fn read_media_form(mut multipart: Multipart) -> Result<(String, MediaInput), RestError> {
    let mut prompt = String::new();
    let mut media = MediaInput {
        mime_type: String::new(),
        data: Bytes::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => {
                prompt = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read the prompt: {}", e)))?;
            }
            "file" => {
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file bytes: {}", e)))?;
                media = MediaInput { mime_type, data };
            }
            _ => {}
        }
    }
    Ok((prompt, media))
}

/// Ask a question about an uploaded image.
#[utoipa::path(
    post,
    path = "/tools/analyze-image",
    request_body(content_type = "multipart/form-data", description = "A `prompt` text part and a `file` image part."),
    responses(
        (status = 200, description = "The model's answer", body = AnalysisResponse),
        (status = 400, description = "Missing prompt or image", body = ErrorBody)
    )
)]
pub async fn analyze_image_handler(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, RestError> {
    let (prompt, image) = read_media_form(multipart).await?;
    let answer = tools::analyze_image(app_state.analysis_adapter.as_ref(), &prompt, &image)
        .await
        .map_err(studio_failure)?;
    Ok(Json(AnalysisResponse { answer }))
}

/// Ask a question about an uploaded video.
#[utoipa::path(
    post,
    path = "/tools/analyze-video",
    request_body(content_type = "multipart/form-data", description = "A `prompt` text part and a `file` video part."),
    responses(
        (status = 200, description = "The model's answer", body = AnalysisResponse),
        (status = 400, description = "Missing prompt or video", body = ErrorBody)
    )
)]
pub async fn analyze_video_handler(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, RestError> {
    let (prompt, video) = read_media_form(multipart).await?;
    let answer = tools::analyze_video(app_state.analysis_adapter.as_ref(), &prompt, &video)
        .await
        .map_err(studio_failure)?;
    Ok(Json(AnalysisResponse { answer }))
}

/// Generate a square image from a prompt.
#[utoipa::path(
    post,
    path = "/tools/generate-image",
    request_body = GenerateImageRequest,
    responses(
        (status = 200, description = "The generated image", body = GeneratedImageResponse),
        (status = 502, description = "No image was generated", body = ErrorBody)
    )
)]
pub async fn generate_image_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<GenerateImageRequest>,
) -> Result<Json<GeneratedImageResponse>, RestError> {
    let image = tools::generate_image(app_state.image_adapter.as_ref(), &request.prompt, request.size)
        .await
        .map_err(studio_failure)?;
    Ok(Json(GeneratedImageResponse {
        mime_type: image.mime_type,
        image_base64: STANDARD.encode(&image.bytes),
        alt_text: image.alt_text,
    }))
}

/// Read text aloud. Returns a WAV file.
#[utoipa::path(
    post,
    path = "/tools/speech",
    request_body = SpeechRequest,
    responses(
        (status = 200, description = "16-bit mono WAV audio", content_type = "audio/wav"),
        (status = 400, description = "Empty text", body = ErrorBody)
    )
)]
pub async fn speech_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SpeechRequest>,
) -> Result<Response, RestError> {
    let pcm = tools::generate_speech(app_state.tts_adapter.as_ref(), &request.text)
        .await
        .map_err(studio_failure)?;
    let wav = pcm16_to_wav(&pcm, SPEECH_SAMPLE_RATE)
        .map_err(|e| internal(format!("Failed to encode WAV audio: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn studio_errors_map_to_http_statuses() {
        assert_eq!(status_for(&StudioError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&StudioError::InvalidCredential("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&StudioError::Busy), StatusCode::CONFLICT);
        assert_eq!(status_for(&StudioError::Timeout { attempts: 60 }), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(&StudioError::ContentGeneration("x".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn failure_bodies_carry_the_user_message() {
        let (status, Json(body)) = studio_failure(StudioError::ArtifactMissing);
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.kind, "artifact_missing");
        assert!(body.retryable);
        assert_eq!(body.message, StudioError::ArtifactMissing.user_message());
    }

    #[test]
    fn openapi_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/sessions",
            "/sessions/current",
            "/skills/{name}/module",
            "/tools/analyze-image",
            "/tools/analyze-video",
            "/tools/generate-image",
            "/tools/speech",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}

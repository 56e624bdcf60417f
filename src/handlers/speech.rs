use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::core::{SynthesisOutput, SynthesisRequest};
use crate::errors::AppError;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const VOICE_LANGUAGE_HEADER: HeaderName = HeaderName::from_static("x-voice-language");
pub const VOICE_ID_HEADER: HeaderName = HeaderName::from_static("x-voice-id");

const STREAM_CHUNK_SIZE: usize = 16 * 1024;

/// Split rendered audio into body chunks. Slices share the one buffer, which
/// is freed once the last chunk is written or the client goes away.
fn chunk_stream(audio: Bytes) -> impl futures::Stream<Item = Result<Bytes, Infallible>> {
    let chunks: Vec<Result<Bytes, Infallible>> = (0..audio.len())
        .step_by(STREAM_CHUNK_SIZE)
        .map(|start| Ok(audio.slice(start..(start + STREAM_CHUNK_SIZE).min(audio.len()))))
        .collect();
    stream::iter(chunks)
}

fn audio_response(request_id: &str, output: SynthesisOutput) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, output.media_type())
        .header(header::CONTENT_LENGTH, output.audio.len())
        .header(REQUEST_ID_HEADER, request_id)
        .header(VOICE_LANGUAGE_HEADER, output.language.as_str());

    // Custom model ids are caller supplied and may not be valid header text
    match HeaderValue::from_str(&output.voice) {
        Ok(voice) => builder = builder.header(VOICE_ID_HEADER, voice),
        Err(_) => warn!(voice = %output.voice, "Voice id is not a valid header value"),
    }

    builder
        .body(Body::from_stream(chunk_stream(output.audio)))
        .unwrap_or_else(|e| {
            AppError::Internal(format!("Failed to build audio response: {e}")).into_response()
        })
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Synthesize speech
///
/// `POST /v1/audio/speech` with an OpenAI-compatible body. Responds with the
/// audio stream in the requested container, or a JSON `{"error": ...}` body.
pub async fn create_speech(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("speech", request_id = %request_id);

    async move {
        let Json(request) = match payload {
            Ok(payload) => payload,
            Err(rejection) => {
                warn!("Rejected speech request body: {rejection}");
                return with_request_id(
                    AppError::BadRequest(rejection.body_text()).into_response(),
                    &request_id,
                );
            }
        };

        info!(
            model = %request.model,
            voice = %request.voice,
            format = %request.response_format,
            chars = request.input.chars().count(),
            "Speech request"
        );

        match state.router.handle(&request).await {
            Ok(output) => audio_response(&request_id, output),
            Err(e) => with_request_id(AppError::from(e).into_response(), &request_id),
        }
    }
    .instrument(span)
    .await
}

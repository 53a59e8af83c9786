//! REST API server for the payment agent
//!
//! Bill images and voice notes come in as base64 JSON and go out as
//! `{"status":"OK","result": <run>}`. Agent failures stay inside `result`;
//! only transport-level problems map to HTTP errors, always with a fixed
//! message.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::agent::{bill_image_request, PaymentAgent};
use crate::speech::{SpeechSynthesizer, Transcriber};
use crate::Result;

const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

const IMAGE_MISSING: &str = "data content missing or image not in data";
const BASE64_FAILED: &str = "Base64 decoding failed";
const AUDIO_MISSING: &str = "Missing 'audio' in JSON";
const TRANSCRIPTION_FAILED: &str = "Transcription failed.";
const TEXT_MISSING: &str = "Missing 'text' in JSON";
const SPEECH_FAILED: &str = "Speech synthesis failed.";

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<PaymentAgent>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub upload_dir: Arc<PathBuf>,
}

/// =============================
/// Helpers
/// =============================

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn ok_response(result: impl serde::Serialize) -> Response {
    (StatusCode::OK, Json(json!({ "status": "OK", "result": result }))).into_response()
}

/// Body as a JSON object; malformed or non-object bodies yield `None`
fn json_object(body: &Bytes) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Standard-alphabet base64, tolerating a `data:<mime>;base64,` prefix and
/// embedded whitespace
pub fn decode_base64_payload(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.trim_start().strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

async fn store_image(upload_dir: &Path, image: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(upload_dir).await?;
    let path = upload_dir.join(format!("{}.png", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, image).await?;
    Ok(tokio::fs::canonicalize(&path).await.unwrap_or(path))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Bill Image Endpoint
/// =============================

async fn upload_image(State(state): State<ApiState>, body: Bytes) -> Response {
    let Some(image_field) = json_object(&body).and_then(|mut map| map.remove("image_base64")) else {
        return error_response(StatusCode::BAD_REQUEST, IMAGE_MISSING);
    };

    let image = match image_field.as_str().map(decode_base64_payload) {
        Some(Ok(bytes)) => bytes,
        Some(Err(e)) => {
            warn!(error = %e, "Rejecting image upload");
            return error_response(StatusCode::BAD_REQUEST, BASE64_FAILED);
        }
        None => return error_response(StatusCode::BAD_REQUEST, BASE64_FAILED),
    };

    let path = match store_image(&state.upload_dir, &image).await {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "Failed to store uploaded image");
            return error_response(StatusCode::BAD_REQUEST, BASE64_FAILED);
        }
    };

    info!(path = %path.display(), bytes = image.len(), "Bill image stored");

    let run = state
        .agent
        .process_request(&bill_image_request(&path.display().to_string()))
        .await;
    ok_response(run)
}

/// =============================
/// Voice Endpoint
/// =============================

async fn upload_audio(State(state): State<ApiState>, body: Bytes) -> Response {
    let Some(audio_field) = json_object(&body).and_then(|mut map| map.remove("audio")) else {
        return error_response(StatusCode::BAD_REQUEST, AUDIO_MISSING);
    };

    let audio = match audio_field.as_str().map(decode_base64_payload) {
        Some(Ok(bytes)) => bytes,
        _ => return error_response(StatusCode::BAD_REQUEST, TRANSCRIPTION_FAILED),
    };

    let text = match state.transcriber.transcribe(audio, "audio.wav").await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Transcription failed");
            return error_response(StatusCode::BAD_REQUEST, TRANSCRIPTION_FAILED);
        }
    };

    info!(transcript = %text, "Voice request transcribed");

    ok_response(state.agent.process_request(&text).await)
}

/// =============================
/// Speech Endpoint
/// =============================

async fn speak(State(state): State<ApiState>, body: Bytes) -> Response {
    let text = json_object(&body)
        .and_then(|map| map.get("text").and_then(|v| v.as_str()).map(str::to_string))
        .filter(|t| !t.trim().is_empty());
    let Some(text) = text else {
        return error_response(StatusCode::BAD_REQUEST, TEXT_MISSING);
    };

    match state.synthesizer.synthesize(&text).await {
        Ok(audio) => ([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response(),
        Err(e) => {
            error!(error = %e, "Speech synthesis failed");
            error_response(StatusCode::BAD_GATEWAY, SPEECH_FAILED)
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload-image", post(upload_image))
        .route("/upload-audio", post(upload_audio))
        .route("/speak", post(speak))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionEngine;
    use crate::extraction::Extractor;
    use crate::llm::{AssistantReply, ScriptedChatModel};
    use crate::speech::testing::{EchoSynthesizer, FixedTranscriber};
    use crate::tools::create_default_registry;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        model: Arc<ScriptedChatModel>,
        _uploads: tempfile::TempDir,
        upload_dir: PathBuf,
    }

    fn harness(replies: Vec<AssistantReply>, transcript: Option<&str>, speech_fails: bool) -> Harness {
        let uploads = tempfile::tempdir().unwrap();
        let upload_dir = uploads.path().join("uploads");
        let model = Arc::new(ScriptedChatModel::from_replies(replies));
        let extractor = Arc::new(Extractor::new(model.clone()));
        let agent = PaymentAgent::new(
            model.clone(),
            ExecutionEngine::new(create_default_registry(extractor)),
        );

        let state = ApiState {
            agent: Arc::new(agent),
            transcriber: Arc::new(FixedTranscriber(transcript.map(str::to_string))),
            synthesizer: Arc::new(EchoSynthesizer { fail: speech_fails }),
            upload_dir: Arc::new(upload_dir.clone()),
        };

        Harness {
            router: create_router(state),
            model,
            _uploads: uploads,
            upload_dir,
        }
    }

    async fn post_json(router: &Router, uri: &str, body: String) -> (StatusCode, Bytes) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        (status, to_bytes(response.into_body(), usize::MAX).await.unwrap())
    }

    fn as_json(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(vec![], None, false);
        let response = h
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = as_json(&to_bytes(response.into_body(), usize::MAX).await.unwrap());
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_upload_image_runs_agent_on_stored_file() {
        let h = harness(vec![AssistantReply::text("Formatted payment.")], None, false);
        let encoded = STANDARD.encode(b"\x89PNG fake bill");

        let (status, body) = post_json(
            &h.router,
            "/upload-image",
            json!({ "image_base64": encoded }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = as_json(&body);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["result"]["success"], true);
        assert_eq!(body["result"]["final_answer"], "Formatted payment.");

        let stored: Vec<_> = std::fs::read_dir(&h.upload_dir).unwrap().collect();
        assert_eq!(stored.len(), 1);
        let stored_path = stored[0].as_ref().unwrap().path();
        assert_eq!(std::fs::read(&stored_path).unwrap(), b"\x89PNG fake bill");

        let instruction = h.model.requests()[0].messages[1]
            .content
            .as_ref()
            .unwrap()
            .as_text();
        assert!(instruction.starts_with("Extract payment information from the bill image at '"));
        assert!(instruction.contains(".png' and give me the formatted payment details"));
    }

    #[tokio::test]
    async fn test_upload_image_agent_failure_still_returns_ok() {
        // no scripted replies: the first model call fails
        let h = harness(vec![], None, false);
        let encoded = STANDARD.encode(b"bill");

        let (status, body) = post_json(
            &h.router,
            "/upload-image",
            json!({ "image_base64": format!("data:image/png;base64,{}", encoded) }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = as_json(&body);
        assert_eq!(body["result"]["success"], false);
        assert_eq!(body["result"]["error"], "Model request failed");
    }

    #[tokio::test]
    async fn test_upload_image_rejects_missing_and_malformed_input() {
        let h = harness(vec![], None, false);

        for payload in ["{}", "not json at all", "", r#"{"image": "AAAA"}"#] {
            let (status, body) = post_json(&h.router, "/upload-image", payload.to_string()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(as_json(&body), json!({ "error": IMAGE_MISSING }));
        }

        for payload in [
            json!({ "image_base64": "!!!not base64!!!" }),
            json!({ "image_base64": 42 }),
        ] {
            let (status, body) = post_json(&h.router, "/upload-image", payload.to_string()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(as_json(&body), json!({ "error": BASE64_FAILED }));
        }

        assert_eq!(h.model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_image_empty_payload_reaches_agent() {
        let h = harness(vec![AssistantReply::text("The image was empty.")], None, false);

        let (status, body) =
            post_json(&h.router, "/upload-image", json!({ "image_base64": "" }).to_string()).await;

        assert_eq!(status, StatusCode::OK);
        let body = as_json(&body);
        assert_eq!(body["status"], "OK");
        assert!(body["result"].is_object());
        assert_eq!(h.model.request_count(), 1);

        let stored: Vec<_> = std::fs::read_dir(&h.upload_dir).unwrap().collect();
        assert_eq!(stored.len(), 1);
        let stored_path = stored[0].as_ref().unwrap().path();
        assert_eq!(std::fs::metadata(stored_path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_upload_image_storage_failure_is_bad_request() {
        let h = harness(vec![], None, false);
        // a regular file where the upload directory should be
        std::fs::create_dir_all(h.upload_dir.parent().unwrap()).unwrap();
        std::fs::write(&h.upload_dir, b"not a directory").unwrap();

        let (status, body) = post_json(
            &h.router,
            "/upload-image",
            json!({ "image_base64": STANDARD.encode(b"bill") }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(as_json(&body), json!({ "error": BASE64_FAILED }));
        assert_eq!(h.model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_audio_passes_transcript_to_agent() {
        let h = harness(
            vec![AssistantReply::text("Przelew przygotowany.")],
            Some("Przelej 1000 zł Damianowi"),
            false,
        );

        let (status, body) = post_json(
            &h.router,
            "/upload-audio",
            json!({ "audio": STANDARD.encode(b"RIFF....WAVE") }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&body)["result"]["final_answer"], "Przelew przygotowany.");
        let request = h.model.requests()[0].messages[1].content.as_ref().unwrap().as_text();
        assert_eq!(request, "Przelej 1000 zł Damianowi");
    }

    #[tokio::test]
    async fn test_upload_audio_errors() {
        let h = harness(vec![], None, false);

        let (status, body) = post_json(&h.router, "/upload-audio", "{}".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(as_json(&body), json!({ "error": AUDIO_MISSING }));

        // decodes fine but the transcript comes back empty
        let (status, body) = post_json(
            &h.router,
            "/upload-audio",
            json!({ "audio": STANDARD.encode(b"silence") }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(as_json(&body), json!({ "error": TRANSCRIPTION_FAILED }));

        let (status, _) = post_json(
            &h.router,
            "/upload-audio",
            json!({ "audio": "%%%" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_speak_returns_mpeg() {
        let h = harness(vec![], None, false);
        let response = h
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/speak")
                    .body(Body::from(json!({ "text": "Gotowe" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(&to_bytes(response.into_body(), usize::MAX).await.unwrap()[..], b"Gotowe");
    }

    #[tokio::test]
    async fn test_speak_errors() {
        let h = harness(vec![], None, false);
        let (status, body) = post_json(&h.router, "/speak", json!({ "txt": "x" }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(as_json(&body), json!({ "error": TEXT_MISSING }));

        let failing = harness(vec![], None, true);
        let (status, body) = post_json(&failing.router, "/speak", json!({ "text": "x" }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(as_json(&body), json!({ "error": SPEECH_FAILED }));
    }

    #[test]
    fn test_decode_base64_payload_variants() {
        assert_eq!(decode_base64_payload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64_payload("aGVs\nbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64_payload("data:image/png;base64,aGVsbG8=").unwrap(), b"hello");
        assert!(decode_base64_payload("aGVsbG8").is_err());
        assert_eq!(decode_base64_payload("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_base64_payload("data:image/png;base64,").unwrap(), Vec::<u8>::new());
    }
}

//! Web UI and HTTP API.
//!
//! - `GET /`                         single page with URL form, summary, player, download link
//! - `GET /api/status`               configured backends and voice
//! - `POST /api/podcasts`            run the pipeline for `{"url": ...}`
//! - `GET /api/podcasts/{id}/audio`  stored audio as an attachment

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{CondenserKind, NamingStrategy, SynthesizerKind, VoiceConfig};
use crate::error::{PipelineError, StoreError};
use crate::pipeline::{Pipeline, RunOutcome, StageLatencies};

const INDEX_HTML: &str = include_str!("ui/index.html");

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    url: String,
}

#[derive(Serialize)]
struct StatusResponse {
    condenser: CondenserKind,
    synthesizer: SynthesizerKind,
    naming: NamingStrategy,
    store_root: String,
    voice: VoiceConfig,
}

#[derive(Serialize)]
struct StoredFiles {
    text: String,
    audio: String,
    metadata: String,
}

#[derive(Serialize)]
struct PodcastResponse {
    status: &'static str,
    id: String,
    url: String,
    script: String,
    audio_url: String,
    audio_format: &'static str,
    download_name: String,
    files: StoredFiles,
    latencies: StageLatencies,
}

impl From<RunOutcome> for PodcastResponse {
    fn from(outcome: RunOutcome) -> Self {
        let record = outcome.record;
        let ext = outcome.audio.format.extension();
        Self {
            status: "ok",
            audio_url: format!("/api/podcasts/{}/audio", record.id),
            download_name: download_name(&record.id, ext),
            audio_format: ext,
            files: StoredFiles {
                text: record.text_path.display().to_string(),
                audio: record.audio_path.display().to_string(),
                metadata: record.metadata_path.display().to_string(),
            },
            url: record.metadata.url,
            id: record.id,
            script: outcome.script,
            latencies: outcome.latencies,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    error: String,
}

/// Error returned by handlers, rendered as a JSON body.
pub struct ApiError {
    status: StatusCode,
    stage: Option<&'static str>,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            stage: None,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_input_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else if matches!(err, PipelineError::Store(_)) {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            stage: Some(err.stage()),
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::InvalidId(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            stage: None,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error",
            stage: self.stage,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn download_name(id: &str, ext: &str) -> String {
    format!("podcast_{id}.{ext}")
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/status", get(handle_status))
        .route("/api/podcasts", post(handle_generate))
        .route("/api/podcasts/{id}/audio", get(handle_audio))
        .with_state(state)
}

/// Serve the web UI until Ctrl+C.
pub async fn serve(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Web UI listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down web UI");
        })
        .await
}

// --- Handlers ---

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let pipeline = &state.pipeline;
    Json(StatusResponse {
        condenser: pipeline.condenser_kind(),
        synthesizer: pipeline.synthesizer_kind(),
        naming: pipeline.store().naming(),
        store_root: pipeline.store().root().display().to_string(),
        voice: pipeline.voice().clone(),
    })
}

async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<PodcastResponse>, ApiError> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("Please enter a valid URL."));
    }

    info!("HTTP /api/podcasts: {url}");
    match state.pipeline.run(url).await {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            warn!("Podcast generation failed for {url}: {e}");
            Err(e.into())
        }
    }
}

async fn handle_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let stored = state.pipeline.store().locate(&id).await?;
    let bytes = tokio::fs::read(&stored.path)
        .await
        .map_err(|e| ApiError::from(StoreError::io(&stored.path, e)))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_name(&id, stored.format.extension())
    );
    Ok((
        [
            (header::CONTENT_TYPE, stored.format.mime().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::Html as HtmlBody;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use crate::config::Config;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Blog page plus a fake speech endpoint on one fixture server.
    async fn fixtures() -> String {
        spawn(
            Router::new()
                .route("/post", get(|| async { HtmlBody("<p>Hello world.</p><p>Second paragraph.</p>") }))
                .route("/translate_tts", get(|| async { "ID3-fake-mp3" })),
        )
        .await
    }

    async fn app(root: &std::path::Path, fixtures: &str) -> String {
        let mut config = Config::default();
        config.store.root = root.to_path_buf();
        config.synthesizer.network.base_url = fixtures.to_string();
        config.history.enabled = false;
        let pipeline = Pipeline::from_config(&config).unwrap();
        spawn(router(AppState {
            pipeline: Arc::new(pipeline),
        }))
        .await
    }

    #[tokio::test]
    async fn test_index_and_status() {
        let dir = tempdir().unwrap();
        let fixtures = fixtures().await;
        let base = app(dir.path(), &fixtures).await;
        let client = reqwest::Client::new();

        let page = client.get(&base).send().await.unwrap().text().await.unwrap();
        assert!(page.contains("Generate Podcast"));

        let status: Value = client
            .get(format!("{base}/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["condenser"], "truncate");
        assert_eq!(status["synthesizer"], "network");
        assert_eq!(status["naming"], "hash");
    }

    #[tokio::test]
    async fn test_generate_then_download() {
        let dir = tempdir().unwrap();
        let fixtures = fixtures().await;
        let base = app(dir.path(), &fixtures).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/podcasts"))
            .json(&json!({ "url": format!("{fixtures}/post") }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["script"], "Hello world.\n\nSecond paragraph.");
        assert_eq!(body["audio_format"], "mp3");

        let audio = client
            .get(format!("{base}{}", body["audio_url"].as_str().unwrap()))
            .send()
            .await
            .unwrap();
        assert_eq!(audio.status(), 200);
        assert_eq!(audio.headers()[header::CONTENT_TYPE], "audio/mpeg");
        let disposition = audio.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains(body["download_name"].as_str().unwrap()));
        // Two sentences → two speech requests.
        assert_eq!(audio.bytes().await.unwrap().as_ref(), b"ID3-fake-mp3ID3-fake-mp3");
    }

    #[tokio::test]
    async fn test_generate_errors() {
        let dir = tempdir().unwrap();
        let fixtures = fixtures().await;
        let base = app(dir.path(), &fixtures).await;
        let client = reqwest::Client::new();

        let empty = client
            .post(format!("{base}/api/podcasts"))
            .json(&json!({ "url": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), 400);

        let missing = client
            .post(format!("{base}/api/podcasts"))
            .json(&json!({ "url": format!("{fixtures}/does-not-exist") }))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 422);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["stage"], "fetch");
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_audio_lookup_errors() {
        let dir = tempdir().unwrap();
        let fixtures = fixtures().await;
        let base = app(dir.path(), &fixtures).await;
        let client = reqwest::Client::new();

        let unknown = client
            .get(format!("{base}/api/podcasts/abc123/audio"))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), 404);

        let invalid = client
            .get(format!("{base}/api/podcasts/a.b/audio"))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), 400);
    }
}

//! Ollama text summarization for podcast scripts.
//!
//! Sends the article to Ollama's /api/generate endpoint and returns the
//! trimmed `response` field. Every failure is an error; the article text is
//! never passed through as a summary.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Condenser, Script};
use crate::config::{CondenserKind, OllamaConfig};
use crate::error::CondenseError;
use crate::fetcher::Article;

const PROMPT_PREFIX: &str =
    "You are a concise podcast script writer. Summarize this text clearly and concisely:\n\n";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// The subset of Ollama's generate response we rely on.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

pub struct OllamaSummarizer {
    config: OllamaConfig,
    client: Client,
}

impl OllamaSummarizer {
    pub fn new(config: &OllamaConfig) -> Result<Self, CondenseError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CondenseError::Client(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CondenseError::Client(format!("header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| CondenseError::Client(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.host.trim_end_matches('/'))
    }

    /// Summarize text for speech.
    pub async fn summarize(&self, text: &str) -> Result<String, CondenseError> {
        let t_start = Instant::now();

        let body = GenerateRequest {
            model: &self.config.model,
            prompt: format!("{PROMPT_PREFIX}{text}"),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.num_predict,
            },
        };

        debug!(
            "Sending {} chars to Ollama model '{}'",
            text.chars().count(),
            self.config.model
        );

        let resp = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    warn!("Cannot connect to Ollama at {}", self.config.host);
                } else if e.is_timeout() {
                    warn!("Ollama request timed out");
                }
                CondenseError::Unreachable {
                    host: self.config.host.clone(),
                    message: e.to_string(),
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CondenseError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| CondenseError::Malformed(e.to_string()))?;

        let summary = data
            .response
            .ok_or(CondenseError::MissingOutput)?
            .trim()
            .to_string();
        if summary.is_empty() {
            return Err(CondenseError::EmptyOutput);
        }

        let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Summarized {} chars → {} chars ({latency_ms:.0}ms)",
            text.chars().count(),
            summary.chars().count()
        );
        Ok(summary)
    }
}

#[async_trait]
impl Condenser for OllamaSummarizer {
    fn kind(&self) -> CondenserKind {
        CondenserKind::Ollama
    }

    async fn condense(&self, article: &Article) -> Result<Script, CondenseError> {
        let text = self.summarize(&article.text).await?;
        Ok(Script {
            text,
            produced_by: CondenserKind::Ollama,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn summarizer(host: String) -> OllamaSummarizer {
        let mut config = OllamaConfig {
            host,
            timeout_secs: 5,
            ..OllamaConfig::default()
        };
        config
            .headers
            .insert("x-some-header".into(), "some-value".into());
        OllamaSummarizer::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_summary_is_trimmed_and_prompted() {
        let router = Router::new().route(
            "/api/generate",
            post(|headers: AxumHeaders, Json(body): Json<Value>| async move {
                assert_eq!(headers["x-some-header"], "some-value");
                assert_eq!(body["stream"], false);
                let prompt = body["prompt"].as_str().unwrap_or_default();
                assert!(prompt.starts_with(PROMPT_PREFIX));
                assert!(prompt.ends_with("Long article."));
                Json(json!({ "model": "llama3.2:latest", "response": "  A short summary.\n", "done": true }))
            }),
        );
        let host = serve(router).await;

        let summary = summarizer(host).summarize("Long article.").await.unwrap();
        assert_eq!(summary, "A short summary.");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_summary_log_counts_characters() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({ "response": "Résumé." })) }),
        );
        let host = serve(router).await;

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        summarizer(host).summarize("héllo wörld").await.unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Summarized 11 chars → 7 chars"), "{output}");
    }

    #[tokio::test]
    async fn test_missing_response_field_is_an_error() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({ "output": "guess the field" })) }),
        );
        let host = serve(router).await;

        let err = summarizer(host).summarize("text").await.unwrap_err();
        assert!(matches!(err, CondenseError::MissingOutput));
    }

    #[tokio::test]
    async fn test_blank_response_is_an_error() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({ "response": "   " })) }),
        );
        let host = serve(router).await;

        let err = summarizer(host).summarize("text").await.unwrap_err();
        assert!(matches!(err, CondenseError::EmptyOutput));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::NOT_FOUND, "model not found") }),
        );
        let host = serve(router).await;

        let err = summarizer(host).summarize("text").await.unwrap_err();
        match err {
            CondenseError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "model not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = summarizer(format!("http://{addr}")).summarize("text").await.unwrap_err();
        assert!(matches!(err, CondenseError::Unreachable { .. }));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let mut config = OllamaConfig::default();
        config.headers.insert("bad header".into(), "v".into());
        assert!(matches!(
            OllamaSummarizer::new(&config),
            Err(CondenseError::Client(_))
        ));
    }
}

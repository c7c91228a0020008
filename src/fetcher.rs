//! Blog page fetching and paragraph extraction.

use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Plain text extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub url: String,
    pub text: String,
}

impl Article {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

pub struct ArticleFetcher {
    client: Client,
    timeout: Duration,
}

impl ArticleFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client, timeout })
    }

    /// GET the page and return its paragraph text.
    ///
    /// A page without paragraphs yields an empty [`Article`], not an error.
    pub async fn fetch(&self, url: &str) -> Result<Article, FetchError> {
        let parsed = validate_url(url)?;

        debug!("GET {parsed} (timeout {:?})", self.timeout);
        let resp = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| request_error(url, e))?;
        let text = extract_paragraphs(&body);
        info!("Fetched {url}: {} bytes of HTML, {} chars of text", body.len(), text.chars().count());

        Ok(Article {
            url: url.to_string(),
            text,
        })
    }
}

fn validate_url(url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    if url.trim().is_empty() {
        return Err(invalid("empty".into()));
    }
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Join the visible text of every `<p>` element, in document order,
/// separated by blank lines.
pub fn extract_paragraphs(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p").expect("static selector");

    document
        .select(&selector)
        .map(|p| p.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

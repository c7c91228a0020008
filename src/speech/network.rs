//! Network TTS via the Google Translate speech endpoint.
//!
//! The endpoint accepts at most 100 characters per request, so the script is
//! split on sentence and word boundaries and the MP3 responses are joined.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::{speakable, split_sentences, AudioArtifact, AudioFormat, Synthesizer};
use crate::config::{NetworkTtsConfig, SynthesizerKind, VoiceConfig};
use crate::error::SynthesisError;

pub const MAX_CHUNK_CHARS: usize = 100;

/// Rates below this are sent as the endpoint's "slow" speed.
const SLOW_RATE_BELOW: u32 = 125;

pub struct GoogleTts {
    client: Client,
    base_url: String,
}

impl GoogleTts {
    pub fn new(config: &NetworkTtsConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SynthesisError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tts_url(&self) -> String {
        format!("{}/translate_tts", self.base_url)
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        idx: usize,
        total: usize,
        voice: &VoiceConfig,
    ) -> Result<Vec<u8>, SynthesisError> {
        let speed = if voice.rate < SLOW_RATE_BELOW { "0.3" } else { "1" };
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();

        let resp = self
            .client
            .get(self.tts_url())
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", voice.language.as_str()),
                ("q", chunk),
                ("ttsspeed", speed),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SynthesisError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SynthesisError::Network(format!("failed to read audio: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Synthesizer for GoogleTts {
    fn kind(&self) -> SynthesizerKind {
        SynthesizerKind::Network
    }

    async fn synthesize(
        &self,
        script: &str,
        voice: &VoiceConfig,
    ) -> Result<AudioArtifact, SynthesisError> {
        let text = speakable(script)?;
        let t_start = Instant::now();
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);

        let mut bytes = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let part = self.fetch_chunk(chunk, i, chunks.len(), voice).await?;
            debug!("TTS chunk {}/{}: {} bytes", i + 1, chunks.len(), part.len());
            bytes.extend_from_slice(&part);
        }

        if bytes.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        info!(
            "Synthesized {} chars in {} chunks → {} bytes mp3 ({:.0}ms)",
            text.chars().count(),
            chunks.len(),
            bytes.len(),
            t_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(AudioArtifact {
            bytes,
            format: AudioFormat::Mp3,
        })
    }
}

/// Split text into pieces of at most `max` characters, preferring sentence
/// boundaries, then word boundaries.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        for word in sentence.split_whitespace() {
            for piece in split_long_word(word, max) {
                let needed = if current.is_empty() {
                    piece.chars().count()
                } else {
                    current.chars().count() + 1 + piece.chars().count()
                };
                if needed > max && !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(piece);
            }
        }
        // Sentence ends close the chunk so requests break at natural pauses.
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
    }

    chunks
}

fn split_long_word(word: &str, max: usize) -> Vec<&str> {
    let max = max.max(1);
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in word.char_indices() {
        if count == max {
            pieces.push(&word[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < word.len() {
        pieces.push(&word[start..]);
    }
    pieces
}

//! Speech synthesis: script → audio bytes.
//!
//! Backends:
//! - `network`: Google Translate TTS endpoint (MP3), needs connectivity
//! - `offline`: local espeak-ng engine (WAV), needs installed voices
//!
//! Both produce a fully materialized [`AudioArtifact`] and refuse empty scripts.

pub mod network;
pub mod offline;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, SynthesizerKind, VoiceConfig};
use crate::error::SynthesisError;

pub use network::GoogleTts;
pub use offline::EspeakEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn kind(&self) -> SynthesizerKind;

    async fn synthesize(
        &self,
        script: &str,
        voice: &VoiceConfig,
    ) -> Result<AudioArtifact, SynthesisError>;
}

/// Build the backend selected in `config.synthesizer.backend`.
pub fn from_config(config: &Config) -> Result<Box<dyn Synthesizer>, SynthesisError> {
    Ok(match config.synthesizer.backend {
        SynthesizerKind::Network => Box::new(GoogleTts::new(&config.synthesizer.network)?),
        SynthesizerKind::Offline => Box::new(EspeakEngine::new(&config.synthesizer.offline)),
    })
}

/// Reject blank scripts before any backend work.
pub(crate) fn speakable(script: &str) -> Result<&str, SynthesisError> {
    let text = script.trim();
    if text.is_empty() {
        Err(SynthesisError::EmptyScript)
    } else {
        Ok(text)
    }
}

/// Split text into sentences at .!? boundaries.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'.' || b == b'!' || b == b'?')
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_whitespace()
        {
            let end = i + 1;
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = end;
        }
    }

    let s = text[start..].trim();
    if !s.is_empty() {
        sentences.push(s);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speakable_rejects_blank() {
        assert!(matches!(speakable(""), Err(SynthesisError::EmptyScript)));
        assert!(matches!(speakable(" \n\t"), Err(SynthesisError::EmptyScript)));
        assert_eq!(speakable("  Hi. ").unwrap(), "Hi.");
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Hello world. Second one!  Third? tail"),
            vec!["Hello world.", "Second one!", "Third?", "tail"]
        );
        assert_eq!(split_sentences("v1.2 is out."), vec!["v1.2 is out."]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Wav.mime(), "audio/wav");
        assert_eq!(AudioFormat::from_extension("wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension("ogg"), None);
    }

    #[tokio::test]
    async fn test_every_backend_rejects_empty_script() {
        let mut config = Config::default();
        for backend in [SynthesizerKind::Network, SynthesizerKind::Offline] {
            config.synthesizer.backend = backend;
            let synth = from_config(&config).unwrap();
            assert_eq!(synth.kind(), backend);
            let err = synth.synthesize("", &VoiceConfig::default()).await.unwrap_err();
            assert!(matches!(err, SynthesisError::EmptyScript));
        }
    }
}

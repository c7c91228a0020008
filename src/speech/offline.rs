//! Offline TTS through the espeak-ng command line engine.
//!
//! The script is piped on stdin and the WAV written to stdout is captured,
//! so nothing touches the filesystem until the store persists it.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{speakable, AudioArtifact, AudioFormat, Synthesizer};
use crate::config::{OfflineTtsConfig, SynthesizerKind, VoiceConfig};
use crate::error::SynthesisError;

/// espeak-ng amplitude for full volume (its default is 100).
const MAX_AMPLITUDE: f32 = 200.0;

/// One installed voice as reported by `espeak-ng --voices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceInfo {
    pub language: String,
    pub name: String,
    pub gender: String,
}

pub struct EspeakEngine {
    binary: String,
}

impl EspeakEngine {
    pub fn new(config: &OfflineTtsConfig) -> Self {
        Self {
            binary: config.binary.clone(),
        }
    }

    fn unavailable(&self, e: std::io::Error) -> SynthesisError {
        SynthesisError::EngineUnavailable {
            binary: self.binary.clone(),
            message: e.to_string(),
        }
    }

    fn voice_args(voice: &VoiceConfig) -> Vec<String> {
        let amplitude = (voice.volume.clamp(0.0, 1.0) * MAX_AMPLITUDE).round() as u32;
        let name = voice
            .voice
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(voice.language.as_str());
        vec![
            "--stdout".into(),
            "-s".into(),
            voice.rate.to_string(),
            "-a".into(),
            amplitude.to_string(),
            "-v".into(),
            name.to_string(),
        ]
    }

    /// List installed voices, optionally filtered by language.
    pub async fn list_voices(&self, language: Option<&str>) -> Result<Vec<VoiceInfo>, SynthesisError> {
        let arg = match language {
            Some(lang) => format!("--voices={lang}"),
            None => "--voices".to_string(),
        };
        let output = Command::new(&self.binary)
            .arg(arg)
            .output()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            return Err(SynthesisError::Engine(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let voices = parse_voices(&String::from_utf8_lossy(&output.stdout));
        if voices.is_empty() {
            return Err(SynthesisError::EngineUnavailable {
                binary: self.binary.clone(),
                message: "no voices installed".into(),
            });
        }
        Ok(voices)
    }
}

#[async_trait]
impl Synthesizer for EspeakEngine {
    fn kind(&self) -> SynthesizerKind {
        SynthesizerKind::Offline
    }

    async fn synthesize(
        &self,
        script: &str,
        voice: &VoiceConfig,
    ) -> Result<AudioArtifact, SynthesisError> {
        let text = speakable(script)?;
        let t_start = Instant::now();
        let args = Self::voice_args(voice);
        debug!("Running {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        // Feed stdin from its own task: the engine starts writing audio before
        // it has read the whole script, so stdout must be drained meanwhile.
        let writer = child.stdin.take().map(|mut stdin| {
            let script = text.as_bytes().to_vec();
            tokio::spawn(async move {
                match stdin.write_all(&script).await {
                    // An engine that exits early closes the pipe; its exit
                    // status carries the real error.
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                }
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SynthesisError::Engine(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SynthesisError::Engine(format!(
                "{} exited with {}: {stderr}",
                self.binary, output.status
            )));
        }

        if let Some(writer) = writer {
            writer
                .await
                .map_err(|e| SynthesisError::Engine(format!("script writer failed: {e}")))?
                .map_err(|e| SynthesisError::Engine(format!("failed to send script: {e}")))?;
        }

        if output.stdout.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        info!(
            "Synthesized {} chars offline → {} bytes wav ({:.0}ms)",
            text.chars().count(),
            output.stdout.len(),
            t_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(AudioArtifact {
            bytes: output.stdout,
            format: AudioFormat::Wav,
        })
    }
}

/// Parse the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
/// ```
pub fn parse_voices(output: &str) -> Vec<VoiceInfo> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let gender = cols[2].rsplit('/').next().unwrap_or("-").to_string();
            Some(VoiceInfo {
                language: cols[1].to_string(),
                name: cols[3].to_string(),
                gender,
            })
        })
        .collect()
}

//! Podcast pipeline: fetch → condense → synthesize → store.
//!
//! Every collaborator is constructed once and owned by the [`Pipeline`];
//! a run borrows them and shares no other state with concurrent runs.
//! Nothing is written to the store unless all earlier stages succeeded.

use std::time::Instant;

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::condenser::{self, Condenser};
use crate::config::{CondenserKind, Config, SynthesizerKind, VoiceConfig};
use crate::error::PipelineError;
use crate::fetcher::ArticleFetcher;
use crate::history::{RunEntry, RunHistory};
use crate::speech::{self, AudioArtifact, Synthesizer};
use crate::store::{ArtifactStore, RunMetadata, RunRecord};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageLatencies {
    pub fetch_ms: f64,
    pub condense_ms: f64,
    pub synthesize_ms: f64,
    pub store_ms: f64,
    pub total_ms: f64,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: RunRecord,
    pub script: String,
    pub audio: AudioArtifact,
    pub latencies: StageLatencies,
}

#[derive(Default)]
struct Progress {
    latencies: StageLatencies,
    article_chars: usize,
    script_chars: usize,
    audio_bytes: usize,
}

fn elapsed_ms(t: Instant) -> f64 {
    t.elapsed().as_secs_f64() * 1000.0
}

pub struct Pipeline {
    fetcher: ArticleFetcher,
    condenser: Box<dyn Condenser>,
    synthesizer: Box<dyn Synthesizer>,
    store: ArtifactStore,
    voice: VoiceConfig,
    history: Option<RunHistory>,
}

impl Pipeline {
    pub fn new(
        fetcher: ArticleFetcher,
        condenser: Box<dyn Condenser>,
        synthesizer: Box<dyn Synthesizer>,
        store: ArtifactStore,
        voice: VoiceConfig,
    ) -> Self {
        Self {
            fetcher,
            condenser,
            synthesizer,
            store,
            voice,
            history: None,
        }
    }

    /// Build every stage from configuration.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let pipeline = Self::new(
            ArticleFetcher::new(&config.fetch)?,
            condenser::from_config(config)?,
            speech::from_config(config)?,
            ArtifactStore::new(&config.store),
            config.voice.clone(),
        );
        Ok(if config.history.enabled {
            pipeline.with_history(RunHistory::new(&config.history))
        } else {
            pipeline
        })
    }

    pub fn with_history(mut self, history: RunHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn condenser_kind(&self) -> CondenserKind {
        self.condenser.kind()
    }

    pub fn synthesizer_kind(&self) -> SynthesizerKind {
        self.synthesizer.kind()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn voice(&self) -> &VoiceConfig {
        &self.voice
    }

    /// Run all stages for one URL.
    pub async fn run(&self, url: &str) -> Result<RunOutcome, PipelineError> {
        let url = url.trim();
        let t_total = Instant::now();
        let mut progress = Progress::default();

        let result = self.run_stages(url, &mut progress).await;
        progress.latencies.total_ms = elapsed_ms(t_total);

        match &result {
            Ok(outcome) => info!(
                "Podcast {} ready: fetch={:.0}ms condense={:.0}ms synth={:.0}ms store={:.0}ms total={:.0}ms",
                outcome.record.id,
                progress.latencies.fetch_ms,
                progress.latencies.condense_ms,
                progress.latencies.synthesize_ms,
                progress.latencies.store_ms,
                progress.latencies.total_ms,
            ),
            Err(e) => warn!("Run for {url} failed at {}: {e}", e.stage()),
        }

        self.record_history(url, &progress, &result).await;

        result.map(|mut outcome| {
            outcome.latencies = progress.latencies;
            outcome
        })
    }

    async fn run_stages(
        &self,
        url: &str,
        progress: &mut Progress,
    ) -> Result<RunOutcome, PipelineError> {
        let started_at = Local::now();

        let t = Instant::now();
        let article = self.fetcher.fetch(url).await?;
        progress.latencies.fetch_ms = elapsed_ms(t);
        progress.article_chars = article.char_count();
        if article.is_empty() {
            return Err(PipelineError::EmptyContent {
                url: url.to_string(),
            });
        }

        let t = Instant::now();
        let script = self.condenser.condense(&article).await?;
        progress.latencies.condense_ms = elapsed_ms(t);
        progress.script_chars = script.char_count();

        let t = Instant::now();
        let audio = self.synthesizer.synthesize(&script.text, &self.voice).await?;
        progress.latencies.synthesize_ms = elapsed_ms(t);
        progress.audio_bytes = audio.len();

        let metadata = RunMetadata {
            id: self.store.identifier(url, &started_at),
            url: url.to_string(),
            created_at: started_at.to_rfc3339(),
            condenser: script.produced_by,
            synthesizer: self.synthesizer.kind(),
            voice: self.voice.clone(),
            audio_format: audio.format,
            article_chars: progress.article_chars,
            script_chars: progress.script_chars,
        };

        let t = Instant::now();
        let record = self.store.persist(&script.text, &audio, &metadata).await?;
        progress.latencies.store_ms = elapsed_ms(t);

        Ok(RunOutcome {
            record,
            script: script.text,
            audio,
            latencies: progress.latencies,
        })
    }

    async fn record_history(
        &self,
        url: &str,
        progress: &Progress,
        result: &Result<RunOutcome, PipelineError>,
    ) {
        let Some(history) = &self.history else {
            return;
        };

        let l = &progress.latencies;
        let mut entry = RunEntry {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            url: url.to_string(),
            outcome: "ok".into(),
            condenser: self.condenser.kind().as_str().into(),
            synthesizer: self.synthesizer.kind().as_str().into(),
            article_chars: progress.article_chars,
            script_chars: progress.script_chars,
            audio_bytes: progress.audio_bytes,
            fetch_latency_ms: l.fetch_ms as i64,
            condense_latency_ms: l.condense_ms as i64,
            synthesize_latency_ms: l.synthesize_ms as i64,
            store_latency_ms: l.store_ms as i64,
            total_latency_ms: l.total_ms as i64,
            ..RunEntry::default()
        };
        match result {
            Ok(outcome) => entry.id = Some(outcome.record.id.clone()),
            Err(e) => {
                entry.outcome = "error".into();
                entry.failed_stage = Some(e.stage().into());
                entry.error = Some(e.to_string());
            }
        }
        // History is plain file I/O; keep it off the async workers.
        let history = history.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || history.save(&entry)).await {
            warn!("History writer failed: {e}");
        }
    }
}

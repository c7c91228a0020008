//! Artifact store: persists script, audio and metadata for one run.
//!
//! Layouts (fixed per deployment by `store.naming`):
//! - `hash`:      `{root}/{sha1(url)}/text.txt`, `audio.{ext}`, `metadata.json`
//! - `timestamp`: `{root}/{YYYYmmdd_HHMMSS}_summary.txt`, `_podcast.{ext}`, `_metadata.json`
//!
//! All three files are written into a staging directory under `root` and
//! moved into place only once every write succeeded.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{CondenserKind, NamingStrategy, StoreConfig, SynthesizerKind, VoiceConfig};
use crate::error::StoreError;
use crate::speech::{AudioArtifact, AudioFormat};

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

const MAX_SWAP_ATTEMPTS: usize = 64;

/// Metadata written next to every stored podcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub id: String,
    pub url: String,
    pub created_at: String,
    pub condenser: CondenserKind,
    pub synthesizer: SynthesizerKind,
    pub voice: VoiceConfig,
    pub audio_format: AudioFormat,
    pub article_chars: usize,
    pub script_chars: usize,
}

/// Where one run's artifacts ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: String,
    pub text_path: PathBuf,
    pub audio_path: PathBuf,
    pub metadata_path: PathBuf,
    pub metadata: RunMetadata,
}

/// A stored audio file found by [`ArtifactStore::locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudio {
    pub path: PathBuf,
    pub format: AudioFormat,
}

struct Layout {
    text: String,
    audio: String,
    metadata: String,
}

pub struct ArtifactStore {
    root: PathBuf,
    naming: NamingStrategy,
}

impl ArtifactStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.root.clone(),
            naming: config.naming,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn naming(&self) -> NamingStrategy {
        self.naming
    }

    /// Identifier for a run of `url` started at `now`.
    pub fn identifier(&self, url: &str, now: &DateTime<Local>) -> String {
        match self.naming {
            NamingStrategy::Hash => url_hash(url),
            NamingStrategy::Timestamp => now.format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    fn layout(&self, id: &str, format: AudioFormat) -> Layout {
        let ext = format.extension();
        match self.naming {
            NamingStrategy::Hash => Layout {
                text: "text.txt".into(),
                audio: format!("audio.{ext}"),
                metadata: "metadata.json".into(),
            },
            NamingStrategy::Timestamp => Layout {
                text: format!("{id}_summary.txt"),
                audio: format!("{id}_podcast.{ext}"),
                metadata: format!("{id}_metadata.json"),
            },
        }
    }

    /// Directory holding the final files of `id`.
    fn final_dir(&self, id: &str) -> PathBuf {
        match self.naming {
            NamingStrategy::Hash => self.root.join(id),
            NamingStrategy::Timestamp => self.root.clone(),
        }
    }

    /// Write script, audio and metadata under `metadata.id`.
    ///
    /// Re-persisting an identifier replaces what was stored before.
    pub async fn persist(
        &self,
        script: &str,
        audio: &AudioArtifact,
        metadata: &RunMetadata,
    ) -> Result<RunRecord, StoreError> {
        let id = validate_id(&metadata.id)?;
        let layout = self.layout(id, audio.format);
        let metadata_json = format!("{}\n", serde_json::to_string_pretty(metadata)?);

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;

        let staging = self.root.join(format!(
            ".staging-{id}-{}-{}",
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result = async {
            fs::create_dir(&staging)
                .await
                .map_err(|e| StoreError::io(&staging, e))?;
            write_file(&staging.join(&layout.text), script.as_bytes()).await?;
            write_file(&staging.join(&layout.audio), &audio.bytes).await?;
            write_file(&staging.join(&layout.metadata), metadata_json.as_bytes()).await?;
            self.commit(id, &staging, &layout, audio.format).await
        }
        .await;

        if let Err(e) = &result {
            warn!("Persist of {id} failed, discarding staged files: {e}");
            if let Err(cleanup) = fs::remove_dir_all(&staging).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove {}: {cleanup}", staging.display());
                }
            }
        }
        result?;

        let dir = self.final_dir(id);
        let record = RunRecord {
            id: id.to_string(),
            text_path: dir.join(&layout.text),
            audio_path: dir.join(&layout.audio),
            metadata_path: dir.join(&layout.metadata),
            metadata: metadata.clone(),
        };
        info!(
            "Stored podcast {id}: {} chars of text, {} bytes of audio in {}",
            script.chars().count(),
            audio.len(),
            dir.display()
        );
        Ok(record)
    }

    async fn commit(
        &self,
        id: &str,
        staging: &Path,
        layout: &Layout,
        format: AudioFormat,
    ) -> Result<(), StoreError> {
        match self.naming {
            NamingStrategy::Hash => self.swap_dir(id, staging).await,
            NamingStrategy::Timestamp => {
                for name in [&layout.text, &layout.audio, &layout.metadata] {
                    let target = self.root.join(name);
                    fs::rename(staging.join(name), &target)
                        .await
                        .map_err(|e| StoreError::io(&target, e))?;
                }
                // A run re-stored in another format must not leave the old audio behind.
                for other in [AudioFormat::Mp3, AudioFormat::Wav] {
                    if other != format {
                        remove_if_exists(&self.root.join(self.layout(id, other).audio)).await?;
                    }
                }
                fs::remove_dir(staging)
                    .await
                    .map_err(|e| StoreError::io(staging, e))
            }
        }
    }

    /// Move `staging` to `{root}/{id}`, replacing whatever is there.
    ///
    /// The current directory is first renamed aside, so a failed swap can put
    /// it back. When a concurrent writer lands between the two renames the
    /// swap is retried, which leaves the last writer's files in place.
    async fn swap_dir(&self, id: &str, staging: &Path) -> Result<(), StoreError> {
        let target = self.root.join(id);

        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let aside = self.root.join(format!(
                ".old-{id}-{}-{}",
                std::process::id(),
                STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
            ));
            let moved = match fs::rename(&target, &aside).await {
                Ok(()) => true,
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(StoreError::io(&target, e)),
            };

            match fs::rename(staging, &target).await {
                Ok(()) => {
                    if moved {
                        debug!("Replaced existing podcast directory {}", target.display());
                        if let Err(e) = fs::remove_dir_all(&aside).await {
                            warn!("Failed to remove {}: {e}", aside.display());
                        }
                    }
                    return Ok(());
                }
                Err(e) if is_occupied(&e) => {
                    debug!("{} was re-created concurrently (attempt {attempt}), retrying", target.display());
                    if moved {
                        if let Err(e) = fs::remove_dir_all(&aside).await {
                            warn!("Failed to remove {}: {e}", aside.display());
                        }
                    }
                }
                Err(e) => {
                    if moved {
                        if let Err(restore) = fs::rename(&aside, &target).await {
                            warn!("Failed to restore {}: {restore}", target.display());
                        }
                    }
                    return Err(StoreError::io(&target, e));
                }
            }
        }

        Err(StoreError::io(
            &target,
            std::io::Error::other(format!(
                "still contended after {MAX_SWAP_ATTEMPTS} attempts"
            )),
        ))
    }

    /// Find the stored audio of a run.
    pub async fn locate(&self, id: &str) -> Result<StoredAudio, StoreError> {
        let id = validate_id(id)?;
        for format in [AudioFormat::Mp3, AudioFormat::Wav] {
            let path = self.final_dir(id).join(self.layout(id, format).audio);
            if fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(StoredAudio { path, format });
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }

    /// Read back the metadata of a run.
    pub async fn load_metadata(&self, id: &str) -> Result<RunMetadata, StoreError> {
        let id = validate_id(id)?;
        let path = self
            .final_dir(id)
            .join(self.layout(id, AudioFormat::Mp3).metadata);
        let contents = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Ok(serde_json::from_str(&contents)?)
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// The rename target exists and is not empty (ENOTEMPTY or EEXIST).
fn is_occupied(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::DirectoryNotEmpty)
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    fs::write(path, data)
        .await
        .map_err(|e| StoreError::io(path, e))
}

/// Lowercase hex SHA-1 of the URL.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn validate_id(id: &str) -> Result<&str, StoreError> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(id)
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

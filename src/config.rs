//! Configuration management for blogcast.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a missing or partial file still yields a usable config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const MIN_RATE: u32 = 100;
pub const MAX_RATE: u32 = 200;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("blogcast/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CondenserKind {
    Truncate,
    Ollama,
}

impl CondenserKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "truncate" | "truncation" => Some(Self::Truncate),
            "ollama" | "summary" | "llm" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truncate => "truncate",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CondenserConfig {
    pub strategy: CondenserKind,
    pub budget_chars: usize,
}

impl Default for CondenserConfig {
    fn default() -> Self {
        Self {
            strategy: CondenserKind::Truncate,
            budget_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub num_predict: u32,
    pub headers: BTreeMap<String, String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".into(),
            model: "llama3.2:latest".into(),
            timeout_secs: 120,
            temperature: 0.3,
            num_predict: 400,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesizerKind {
    Network,
    Offline,
}

impl SynthesizerKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "network" | "gtts" | "google" => Some(Self::Network),
            "offline" | "espeak" | "local" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkTtsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for NetworkTtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://translate.google.com".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OfflineTtsConfig {
    pub binary: String,
}

impl Default for OfflineTtsConfig {
    fn default() -> Self {
        Self {
            binary: "espeak-ng".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    pub backend: SynthesizerKind,
    pub network: NetworkTtsConfig,
    pub offline: OfflineTtsConfig,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            backend: SynthesizerKind::Network,
            network: NetworkTtsConfig::default(),
            offline: OfflineTtsConfig::default(),
        }
    }
}

/// Synthesis parameters shared by both speech backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Words per minute, 100..=200.
    pub rate: u32,
    /// Gain, 0.0..=1.0.
    pub volume: f32,
    /// Backend-specific voice name. `None` picks the language default.
    pub voice: Option<String>,
    pub language: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            rate: 150,
            volume: 0.8,
            voice: None,
            language: "en".into(),
        }
    }
}

impl VoiceConfig {
    /// Clamp rate and volume into their supported ranges.
    pub fn normalized(mut self) -> Self {
        if !(MIN_RATE..=MAX_RATE).contains(&self.rate) {
            let clamped = self.rate.clamp(MIN_RATE, MAX_RATE);
            warn!("Voice rate {} out of range, using {clamped}", self.rate);
            self.rate = clamped;
        }
        if !(0.0..=1.0).contains(&self.volume) || self.volume.is_nan() {
            let clamped = if self.volume.is_nan() {
                VoiceConfig::default().volume
            } else {
                self.volume.clamp(0.0, 1.0)
            };
            warn!("Voice volume {} out of range, using {clamped}", self.volume);
            self.volume = clamped;
        }
        if self.language.trim().is_empty() {
            self.language = VoiceConfig::default().language;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
    /// `{root}/{sha1(url)}/...`
    Hash,
    /// `{root}/{YYYYmmdd_HHMMSS}_*`
    Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub naming: NamingStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("podcasts_data"),
            naming: NamingStrategy::Hash,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8501,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub notifications: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Defaults to `~/.blogcast-history`.
    pub dir: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl HistoryConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".blogcast-history")
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub condenser: CondenserConfig,
    pub ollama: OllamaConfig,
    pub synthesizer: SynthesizerConfig,
    pub voice: VoiceConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub feedback: FeedbackConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/blogcast/config.yaml
    /// 3. /etc/blogcast/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/blogcast/config.yaml")),
                Some(PathBuf::from("/etc/blogcast/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        let config = match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        };

        config.normalized()
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str::<Self>(contents).map(Self::normalized)
    }

    fn normalized(mut self) -> Self {
        self.voice = self.voice.normalized();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.condenser.strategy, CondenserKind::Truncate);
        assert_eq!(config.condenser.budget_chars, 2000);
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.synthesizer.backend, SynthesizerKind::Network);
        assert_eq!(config.store.naming, NamingStrategy::Hash);
        assert_eq!(config.voice.rate, 150);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
condenser:
  strategy: ollama
ollama:
  model: mistral
  headers:
    x-some-header: some-value
store:
  naming: timestamp
  root: outputs
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.condenser.strategy, CondenserKind::Ollama);
        assert_eq!(config.condenser.budget_chars, 2000);
        assert_eq!(config.ollama.model, "mistral");
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(
            config.ollama.headers.get("x-some-header").map(String::as_str),
            Some("some-value")
        );
        assert_eq!(config.store.naming, NamingStrategy::Timestamp);
        assert_eq!(config.store.root, PathBuf::from("outputs"));
    }

    #[test]
    fn test_voice_values_are_clamped() {
        let yaml = "voice:\n  rate: 400\n  volume: 1.5\n  language: ''\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.voice.rate, MAX_RATE);
        assert_eq!(config.voice.volume, 1.0);
        assert_eq!(config.voice.language, "en");

        let slow = VoiceConfig {
            rate: 10,
            ..VoiceConfig::default()
        }
        .normalized();
        assert_eq!(slow.rate, MIN_RATE);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(CondenserKind::from_str("LLM"), Some(CondenserKind::Ollama));
        assert_eq!(CondenserKind::from_str("truncate"), Some(CondenserKind::Truncate));
        assert_eq!(CondenserKind::from_str("nope"), None);
        assert_eq!(SynthesizerKind::from_str("espeak"), Some(SynthesizerKind::Offline));
        assert_eq!(SynthesizerKind::from_str("gtts"), Some(SynthesizerKind::Network));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/blogcast/config.yaml")));
        assert_eq!(config.server.port, 8501);
    }
}

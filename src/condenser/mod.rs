//! Text condensing: article text → podcast script.
//!
//! Two strategies share the [`Condenser`] trait:
//! - `ollama`: abstractive summary from a local Ollama server
//! - `truncate`: deterministic cut to a character budget, no network

pub mod ollama;
pub mod truncate;

use async_trait::async_trait;

use crate::config::{Config, CondenserKind};
use crate::error::CondenseError;
use crate::fetcher::Article;

pub use ollama::OllamaSummarizer;
pub use truncate::Truncator;

/// Condensed text ready for speech synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub text: String,
    pub produced_by: CondenserKind,
}

impl Script {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[async_trait]
pub trait Condenser: Send + Sync {
    fn kind(&self) -> CondenserKind;

    async fn condense(&self, article: &Article) -> Result<Script, CondenseError>;
}

/// Build the condenser selected in `config.condenser.strategy`.
pub fn from_config(config: &Config) -> Result<Box<dyn Condenser>, CondenseError> {
    Ok(match config.condenser.strategy {
        CondenserKind::Truncate => Box::new(Truncator::new(config.condenser.budget_chars)),
        CondenserKind::Ollama => Box::new(OllamaSummarizer::new(&config.ollama)?),
    })
}

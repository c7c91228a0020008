//! Character-budget truncation, the fallback when no summarizer is available.

use async_trait::async_trait;

use super::{Condenser, Script};
use crate::config::CondenserKind;
use crate::error::CondenseError;
use crate::fetcher::Article;

pub const ELLIPSIS: &str = "...";

pub struct Truncator {
    budget: usize,
}

impl Truncator {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }
}

#[async_trait]
impl Condenser for Truncator {
    fn kind(&self) -> CondenserKind {
        CondenserKind::Truncate
    }

    async fn condense(&self, article: &Article) -> Result<Script, CondenseError> {
        Ok(Script {
            text: truncate(&article.text, self.budget),
            produced_by: CondenserKind::Truncate,
        })
    }
}

/// Cap `text` at `budget` characters, appending [`ELLIPSIS`] when cut.
pub fn truncate(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

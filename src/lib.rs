//! blogcast: turn blog articles into short spoken podcast clips.
//!
//! A run is a straight pipeline: fetch the page, condense the article
//! (Ollama summary or truncation), synthesize speech (network or offline
//! engine), then store script, audio and metadata together.

pub mod api;
pub mod condenser;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod notifier;
pub mod pipeline;
pub mod speech;
pub mod store;

pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{Pipeline, RunOutcome};

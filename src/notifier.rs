//! Desktop notifications via notify-rust (D-Bus).

use notify_rust::Notification;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::pipeline::RunOutcome;

pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn notify(&self, summary: &str, body: &str) {
        if !self.enabled {
            return;
        }

        debug!("Notification: {summary}");

        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .icon("audio-x-generic")
            .timeout(5000)
            .show()
        {
            warn!("Failed to show notification: {e}");
        }
    }

    pub fn run_finished(&self, result: &Result<RunOutcome, PipelineError>) {
        match result {
            Ok(outcome) => self.notify(
                "Podcast ready",
                &format!("Saved to {}", outcome.record.audio_path.display()),
            ),
            Err(e) => self.notify("Podcast failed", &e.to_string()),
        }
    }
}

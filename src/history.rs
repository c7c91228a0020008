//! Run history and daily reporting.
//!
//! Every pipeline run, successful or not, is appended as one JSON line to
//! `{dir}/{YYYY-MM-DD}.jsonl`. History is best effort: failures are logged
//! and never affect the run itself.

use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::HistoryConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub timestamp: String,
    pub url: String,
    /// `ok` or `error`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub condenser: String,
    pub synthesizer: String,
    pub article_chars: usize,
    pub script_chars: usize,
    pub audio_bytes: usize,
    pub fetch_latency_ms: i64,
    pub condense_latency_ms: i64,
    pub synthesize_latency_ms: i64,
    pub store_latency_ms: i64,
    pub total_latency_ms: i64,
}

impl RunEntry {
    pub fn succeeded(&self) -> bool {
        self.outcome == "ok"
    }
}

#[derive(Debug, Clone)]
pub struct RunHistory {
    dir: PathBuf,
    enabled: bool,
}

impl RunHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            dir: config.resolved_dir(),
            enabled: config.enabled,
        }
    }

    fn file(&self, date: &str) -> PathBuf {
        let date_str = if date == "today" {
            Local::now().format("%Y-%m-%d").to_string()
        } else {
            date.to_string()
        };
        self.dir.join(format!("{date_str}.jsonl"))
    }

    /// Append a run to today's history file.
    pub fn save(&self, entry: &RunEntry) {
        if !self.enabled {
            return;
        }
        if let Err(e) = fs::create_dir_all(&self.dir) {
            error!("Failed to create history dir: {e}");
            return;
        }

        let path = self.file("today");
        match fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => match serde_json::to_string(entry) {
                Ok(json) => {
                    // One write per record keeps concurrent appends whole.
                    if let Err(e) = file.write_all(format!("{json}\n").as_bytes()) {
                        error!("Failed to write history record: {e}");
                    } else {
                        debug!("Saved run record to {}", path.display());
                    }
                }
                Err(e) => error!("Failed to serialize record: {e}"),
            },
            Err(e) => error!("Failed to open history file: {e}"),
        }
    }

    /// Load all runs for a date (`today` or `YYYY-MM-DD`).
    pub fn load(&self, date: &str) -> Vec<RunEntry> {
        let path = self.file(date);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        std::io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<RunEntry>(&line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping malformed history line: {e}");
                    None
                }
            })
            .collect()
    }

    /// All dates with history, newest first.
    pub fn list_dates(&self) -> Vec<String> {
        let mut dates: Vec<String> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let name = entry.ok()?.file_name().to_string_lossy().to_string();
                name.strip_suffix(".jsonl").map(str::to_string)
            })
            .collect();

        dates.sort_by(|a, b| b.cmp(a));
        dates
    }

    /// Markdown report for one date.
    pub fn report(&self, date: &str) -> String {
        let entries = self.load(date);
        let display_date = if date == "today" {
            Local::now().format("%Y-%m-%d").to_string()
        } else {
            date.to_string()
        };
        render_report(&display_date, &entries)
    }
}

fn average(values: impl Iterator<Item = i64>) -> f64 {
    let (sum, count) = values.fold((0i64, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

pub fn render_report(date: &str, entries: &[RunEntry]) -> String {
    if entries.is_empty() {
        return format!("# Blogcast Report - {date}\n\nNo podcasts generated.");
    }

    let ok: Vec<&RunEntry> = entries.iter().filter(|e| e.succeeded()).collect();
    let failed = entries.len() - ok.len();
    let total_audio: usize = ok.iter().map(|e| e.audio_bytes).sum();

    let mut lines = vec![
        format!("# Blogcast Report - {date}"),
        String::new(),
        "## Summary".to_string(),
        format!("- **Runs**: {}", entries.len()),
        format!("- **Podcasts**: {}", ok.len()),
        format!("- **Failures**: {failed}"),
        format!("- **Audio produced**: {:.1} KiB", total_audio as f64 / 1024.0),
    ];

    if !ok.is_empty() {
        lines.extend([
            String::new(),
            "## Latency Averages".to_string(),
            format!("- Fetch: {:.0}ms", average(ok.iter().map(|e| e.fetch_latency_ms))),
            format!("- Condense: {:.0}ms", average(ok.iter().map(|e| e.condense_latency_ms))),
            format!("- Synthesize: {:.0}ms", average(ok.iter().map(|e| e.synthesize_latency_ms))),
            format!("- Store: {:.0}ms", average(ok.iter().map(|e| e.store_latency_ms))),
            format!("- Total: {:.0}ms", average(ok.iter().map(|e| e.total_latency_ms))),
        ]);
    }

    lines.extend([
        String::new(),
        "## Run Log".to_string(),
        String::new(),
        "| Time | URL | Result | Script chars | Total |".to_string(),
        "|------|-----|--------|--------------|-------|".to_string(),
    ]);

    for e in entries {
        let time_str = e.timestamp.get(11..19).unwrap_or(&e.timestamp);
        let result = if e.succeeded() {
            "ok".to_string()
        } else {
            format!("failed ({})", e.failed_stage.as_deref().unwrap_or("?"))
        };
        lines.push(format!(
            "| {time_str} | {} | {result} | {} | {}ms |",
            truncate(&e.url, 40),
            e.script_chars,
            e.total_latency_ms
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn history(dir: &std::path::Path) -> RunHistory {
        RunHistory::new(&HistoryConfig {
            enabled: true,
            dir: Some(dir.to_path_buf()),
        })
    }

    fn entry(outcome: &str, total: i64) -> RunEntry {
        RunEntry {
            timestamp: "2026-10-16T08:15:30.123".into(),
            url: "https://example.com/post".into(),
            outcome: outcome.into(),
            condenser: "truncate".into(),
            synthesizer: "network".into(),
            script_chars: 31,
            audio_bytes: 2048,
            total_latency_ms: total,
            ..RunEntry::default()
        }
    }

    #[test]
    fn test_save_and_load_today() {
        let dir = tempdir().unwrap();
        let history = history(dir.path());

        history.save(&entry("ok", 100));
        history.save(&RunEntry {
            failed_stage: Some("fetch".into()),
            error: Some("404".into()),
            ..entry("error", 5)
        });

        let loaded = history.load("today");
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].succeeded());
        assert_eq!(loaded[1].failed_stage.as_deref(), Some("fetch"));
        assert_eq!(history.list_dates().len(), 1);
    }

    #[test]
    fn test_disabled_history_writes_nothing() {
        let dir = tempdir().unwrap();
        let history = RunHistory::new(&HistoryConfig {
            enabled: false,
            dir: Some(dir.path().join("h")),
        });
        history.save(&entry("ok", 1));
        assert!(!dir.path().join("h").exists());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let history = history(dir.path());
        let line = serde_json::to_string(&entry("ok", 7)).unwrap();
        std::fs::write(dir.path().join("2026-10-15.jsonl"), format!("not json\n{line}\n\n")).unwrap();

        let loaded = history.load("2026-10-15");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].total_latency_ms, 7);
    }

    #[test]
    fn test_list_dates_newest_first() {
        let dir = tempdir().unwrap();
        for date in ["2026-10-01", "2026-10-15", "2026-09-30"] {
            std::fs::write(dir.path().join(format!("{date}.jsonl")), "").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        assert_eq!(
            history(dir.path()).list_dates(),
            vec!["2026-10-15", "2026-10-01", "2026-09-30"]
        );
    }

    #[test]
    fn test_report() {
        let report = render_report("2026-10-16", &[entry("ok", 100), entry("ok", 300), RunEntry {
            failed_stage: Some("synthesize".into()),
            ..entry("error", 50)
        }]);
        assert!(report.starts_with("# Blogcast Report - 2026-10-16"));
        assert!(report.contains("- **Runs**: 3"));
        assert!(report.contains("- **Failures**: 1"));
        assert!(report.contains("- Total: 200ms"));
        assert!(report.contains("| 08:15:30 | https://example.com/post | failed (synthesize) | 31 | 50ms |"));
    }

    #[test]
    fn test_empty_report() {
        assert!(render_report("2026-10-16", &[]).contains("No podcasts generated."));
    }
}

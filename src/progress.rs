//! Crawl progress reporting.
//!
//! Reports observable progress during `gallery crawl` and `gallery reprocess`
//! so users see which adapters are still fetching and how far the pipeline
//! has got. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts.

use std::io::Write;

/// A single progress event for a crawl.
#[derive(Clone, Debug, PartialEq)]
pub enum CrawlProgressEvent {
    /// An adapter has started producing candidates. Total unknown.
    Discovering { adapter: String },
    /// An adapter finished with `items` candidates.
    Discovered { adapter: String, items: u64 },
    /// `n` of `total` candidates have reached a terminal outcome.
    Processing { n: u64, total: u64, added: u64 },
}

/// Reports crawl progress. Implementations write to stderr (human or JSON).
pub trait CrawlProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingestion pipeline.
    fn report(&self, event: CrawlProgressEvent);
}

/// Human-friendly progress on stderr: "crawl  processing  12 / 140 items  (3 added)".
pub struct StderrProgress;

impl CrawlProgressReporter for StderrProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let line = match &event {
            CrawlProgressEvent::Discovering { adapter } => {
                format!("crawl {}  discovering...\n", adapter)
            }
            CrawlProgressEvent::Discovered { adapter, items } => {
                format!("crawl {}  found {} items\n", adapter, format_number(*items))
            }
            CrawlProgressEvent::Processing { n, total, added } => format!(
                "crawl  processing  {} / {} items  ({} added)\n",
                format_number(*n),
                format_number(*total),
                format_number(*added)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl CrawlProgressReporter for JsonProgress {
    fn report(&self, event: CrawlProgressEvent) {
        let obj = match &event {
            CrawlProgressEvent::Discovering { adapter } => serde_json::json!({
                "event": "progress",
                "adapter": adapter,
                "phase": "discovering"
            }),
            CrawlProgressEvent::Discovered { adapter, items } => serde_json::json!({
                "event": "progress",
                "adapter": adapter,
                "phase": "discovered",
                "items": items
            }),
            CrawlProgressEvent::Processing { n, total, added } => serde_json::json!({
                "event": "progress",
                "phase": "processing",
                "n": n,
                "total": total,
                "added": added
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CrawlProgressReporter for NoProgress {
    fn report(&self, _event: CrawlProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn CrawlProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn off_mode_is_silent() {
        // NoProgress must accept every event without side effects
        let reporter = ProgressMode::Off.reporter();
        reporter.report(CrawlProgressEvent::Discovering {
            adapter: "news".into(),
        });
        reporter.report(CrawlProgressEvent::Processing {
            n: 1,
            total: 2,
            added: 1,
        });
    }
}

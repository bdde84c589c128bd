//! Progress rendering for running jobs.
//!
//! Feeds on the supervisor's event stream. On a terminal every job gets its own
//! `indicatif` bar; otherwise throttled plain lines are printed.

use std::collections::HashMap;
use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use gogload_core::{DownloadEvent, DownloadStatus};

const MAX_LABEL: usize = 32;

/// Minimum gap between two plain progress lines of one job.
const PLAIN_INTERVAL: Duration = Duration::from_secs(2);

/// Progress display that selects terminal or plain output.
pub struct ProgressDisplay {
    inner: ProgressRender,
}

enum ProgressRender {
    Fancy(FancyProgress),
    Plain(PlainProgress),
}

impl ProgressDisplay {
    /// Create a display, auto-detecting terminal capability.
    pub fn new() -> Self {
        if io::stdout().is_terminal() {
            Self {
                inner: ProgressRender::Fancy(FancyProgress::new()),
            }
        } else {
            Self::plain()
        }
    }

    /// A display that only prints lines.
    pub fn plain() -> Self {
        Self {
            inner: ProgressRender::Plain(PlainProgress::default()),
        }
    }

    /// Render one engine event.
    pub fn handle(&mut self, event: &DownloadEvent) {
        match &mut self.inner {
            ProgressRender::Fancy(inner) => inner.handle(event),
            ProgressRender::Plain(inner) => {
                if let Some(line) = inner.line_for(event, Instant::now()) {
                    println!("{line}");
                }
            }
        }
    }

    /// Clear any bars still on screen.
    pub fn finish(&mut self) {
        if let ProgressRender::Fancy(inner) = &mut self.inner {
            inner.finish();
        }
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fancy Terminal Progress (indicatif)
// ============================================================================

struct FancyProgress {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl FancyProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stdout()),
            bars: HashMap::new(),
        }
    }

    fn handle(&mut self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Progress {
                job_id,
                bytes_downloaded,
                total_bytes,
                speed_bps,
                eta_seconds,
                current_file_index,
                total_files,
                ..
            } => {
                let bar = self.bar(job_id);
                if *total_bytes > 0 && bar.length() != Some(*total_bytes) {
                    bar.set_style(bar_style());
                    bar.set_length(*total_bytes);
                }
                bar.set_position(*bytes_downloaded);
                let mut message = format!(
                    "{}/s ETA {}",
                    HumanBytes(speed(*speed_bps)),
                    eta(*eta_seconds)
                );
                if *total_files > 1 {
                    let file = current_file_index + 1;
                    message.push_str(&format!(" [file {file}/{total_files}]"));
                }
                bar.set_message(message);
            }
            DownloadEvent::StatusChanged { job_id, status, .. } => {
                if let Some(line) = describe_event(event) {
                    let _ = self.multi.println(line);
                }
                match status {
                    DownloadStatus::Pending => {}
                    DownloadStatus::Downloading => {
                        self.bar(job_id);
                    }
                    _ => {
                        if let Some(bar) = self.bars.remove(job_id) {
                            bar.finish_and_clear();
                            self.multi.remove(&bar);
                        }
                    }
                }
            }
            DownloadEvent::FileFinished { .. } => {
                if let Some(line) = describe_event(event) {
                    let _ = self.multi.println(line);
                }
            }
        }
    }

    fn bar(&mut self, job_id: &str) -> &ProgressBar {
        let multi = &self.multi;
        self.bars.entry(job_id.to_string()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new_spinner());
            bar.set_style(spinner_style());
            bar.set_prefix(format_label(job_id));
            bar.set_message("connecting");
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        })
    }

    fn finish(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:.bold} {bar:28.cyan/blue} {bytes:>10} / {total_bytes:>10} ({percent:>3}%) {msg}",
    )
    .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("=> "))
}

fn format_label(raw: &str) -> String {
    let char_count = raw.chars().count();
    if char_count <= MAX_LABEL {
        return format!("{raw:<MAX_LABEL$}");
    }
    let mut buf: String = raw.chars().take(MAX_LABEL - 1).collect();
    buf.push('…');
    buf
}

// ============================================================================
// Plain Progress (non-terminal)
// ============================================================================

#[derive(Default)]
struct PlainProgress {
    last_emit: HashMap<String, Instant>,
}

impl PlainProgress {
    /// The line to print for `event`, if any. Progress lines are throttled per job.
    fn line_for(&mut self, event: &DownloadEvent, now: Instant) -> Option<String> {
        let DownloadEvent::Progress {
            job_id,
            bytes_downloaded,
            total_bytes,
            speed_bps,
            percentage,
            ..
        } = event
        else {
            if let DownloadEvent::StatusChanged { job_id, .. } = event {
                self.last_emit.remove(job_id);
            }
            return describe_event(event);
        };

        if let Some(last) = self.last_emit.get(job_id) {
            if now.duration_since(*last) < PLAIN_INTERVAL {
                return None;
            }
        }
        self.last_emit.insert(job_id.clone(), now);

        Some(format!(
            "{job_id}: {} / {} ({percentage:.1}%) @ {}/s",
            HumanBytes(*bytes_downloaded),
            HumanBytes(*total_bytes),
            HumanBytes(speed(*speed_bps)),
        ))
    }
}

// ============================================================================
// Shared text
// ============================================================================

/// One-line description of a status or file event.
pub fn describe_event(event: &DownloadEvent) -> Option<String> {
    match event {
        DownloadEvent::Progress { .. } => None,
        DownloadEvent::StatusChanged {
            job_id,
            status,
            message,
            ..
        } => {
            let mut line = format!("{job_id}: {status}");
            if let Some(message) = message {
                line.push_str(&format!(" ({message})"));
            }
            Some(line)
        }
        DownloadEvent::FileFinished {
            file_name,
            status,
            error,
            ..
        } => Some(match (status, error) {
            (DownloadStatus::Completed, _) => format!("  ✓ {file_name}"),
            (_, Some(error)) => format!("  ✗ {file_name}: {error}"),
            (status, None) => format!("  ✗ {file_name}: {status}"),
        }),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn speed(bps: f64) -> u64 {
    if bps.is_finite() && bps > 0.0 { bps as u64 } else { 0 }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn eta(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "--".to_string();
    }
    let total = seconds.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

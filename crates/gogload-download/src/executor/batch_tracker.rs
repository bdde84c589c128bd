//! Batch progress tracker.
//!
//! Pure state machine that aggregates per-file progress into one figure for
//! the batch and counts per-file outcomes. No I/O or locking happens here;
//! callers pass the clock reading in.

use std::time::{Duration, Instant};

use gogload_core::ProgressSnapshot;

use crate::progress::SpeedMeter;

#[derive(Debug, Clone, Default)]
struct FileSlot {
    downloaded: u64,
    total: u64,
    /// `Some(true)` completed, `Some(false)` failed.
    result: Option<bool>,
}

/// Aggregates the files of one batch.
///
/// INVARIANT: each file index is counted at most once, so the number of
/// reported files never exceeds the batch size.
#[derive(Debug, Clone)]
pub struct BatchTracker {
    files: Vec<FileSlot>,
    meter: SpeedMeter,
}

impl BatchTracker {
    /// Create a tracker seeded with the catalog sizes of each file.
    ///
    /// Batch speed is sampled over the aggregate byte count every `sample_interval`.
    pub fn new(
        expected_sizes: impl IntoIterator<Item = Option<u64>>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            files: expected_sizes
                .into_iter()
                .map(|size| FileSlot {
                    total: size.unwrap_or(0),
                    ..FileSlot::default()
                })
                .collect(),
            meter: SpeedMeter::new(sample_interval),
        }
    }

    /// Replace a file's total once the real size is known.
    pub fn set_total(&mut self, index: usize, total: u64) {
        if let Some(slot) = self.files.get_mut(index) {
            slot.total = total;
        }
    }

    /// Record a progress tick of one file and return the batch-wide snapshot.
    ///
    /// Ticks may arrive after the file's outcome; those are ignored.
    pub fn on_progress(
        &mut self,
        index: usize,
        downloaded: u64,
        total: u64,
        now: Instant,
    ) -> ProgressSnapshot {
        if let Some(slot) = self.files.get_mut(index).filter(|slot| slot.result.is_none()) {
            slot.downloaded = slot.downloaded.max(downloaded);
            if total > 0 {
                slot.total = total;
            }
        }
        self.meter.update_at(self.downloaded(), now);
        self.snapshot(index)
    }

    /// Start a fresh speed window.
    ///
    /// Called after bytes were credited without being transferred (files
    /// finished by an earlier run), so the jump is not read as throughput.
    pub const fn restart_speed_window(&mut self) {
        self.meter.reset();
    }

    /// Record a file outcome. Returns `false` if the file was already counted.
    pub fn on_file_done(&mut self, index: usize, succeeded: bool) -> bool {
        let Some(slot) = self.files.get_mut(index) else {
            return false;
        };
        if slot.result.is_some() {
            return false;
        }
        slot.result = Some(succeeded);
        if succeeded {
            slot.downloaded = slot.total.max(slot.downloaded);
            slot.total = slot.downloaded;
        }
        true
    }

    /// Batch-wide progress attributed to `current_file_index`.
    pub fn snapshot(&self, current_file_index: usize) -> ProgressSnapshot {
        let bytes_downloaded = self.downloaded();
        let total_bytes = self.files.iter().map(|f| f.total).sum();
        ProgressSnapshot {
            bytes_downloaded,
            total_bytes,
            speed_bps: self.meter.speed(),
            eta_seconds: self
                .meter
                .eta(bytes_downloaded, total_bytes)
                .map_or(0.0, |eta| eta.as_secs_f64()),
            current_file_index: u32::try_from(current_file_index).unwrap_or(u32::MAX),
            total_files: self.total_files(),
        }
    }

    fn downloaded(&self) -> u64 {
        self.files.iter().map(|f| f.downloaded).sum()
    }

    pub fn total_files(&self) -> u32 {
        u32::try_from(self.files.len()).unwrap_or(u32::MAX)
    }

    pub fn reported(&self) -> u32 {
        self.count(|r| r.is_some())
    }

    pub fn succeeded(&self) -> u32 {
        self.count(|r| r == Some(true))
    }

    pub fn failed(&self) -> u32 {
        self.count(|r| r == Some(false))
    }

    pub fn is_complete(&self) -> bool {
        self.reported() == self.total_files()
    }

    /// Failure message for a finished batch, `None` if every file succeeded.
    pub fn failure_message(&self) -> Option<String> {
        let total = self.total_files();
        match (self.succeeded(), self.failed()) {
            (_, 0) => None,
            (0, _) => Some(format!("all {total} files failed")),
            (succeeded, _) => Some(format!("{succeeded}/{total} files completed")),
        }
    }

    fn count(&self, pred: impl Fn(Option<bool>) -> bool) -> u32 {
        let n = self.files.iter().filter(|f| pred(f.result)).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(500);

    fn tracker(sizes: impl IntoIterator<Item = Option<u64>>) -> BatchTracker {
        BatchTracker::new(sizes, INTERVAL)
    }

    #[test]
    fn aggregates_bytes_across_files() {
        let mut tracker = tracker([Some(100), Some(200), None]);
        let t0 = Instant::now();

        tracker.on_progress(0, 50, 100, t0);
        let snapshot = tracker.on_progress(2, 30, 300, t0);

        assert_eq!(snapshot.bytes_downloaded, 80);
        assert_eq!(snapshot.total_bytes, 600);
        assert_eq!(snapshot.current_file_index, 2);
        assert_eq!(snapshot.total_files, 3);
    }

    #[test]
    fn speed_and_eta_follow_the_aggregate() {
        let mut tracker = tracker([Some(1000), Some(1000)]);
        let t0 = Instant::now();

        tracker.on_progress(0, 0, 1000, t0);
        tracker.on_progress(0, 100, 1000, t0 + Duration::from_millis(200));
        let snapshot = tracker.on_progress(1, 100, 1000, t0 + Duration::from_secs(1));

        // 200 bytes over one second, 1800 left
        assert!((snapshot.speed_bps - 200.0).abs() < 0.01);
        assert!((snapshot.eta_seconds - 9.0).abs() < 0.01);
    }

    #[test]
    fn credited_files_do_not_count_as_throughput() {
        let mut tracker = tracker([Some(10_000), Some(1000)]);
        let t0 = Instant::now();
        tracker.on_progress(1, 0, 1000, t0);

        // File 0 finished in an earlier run
        tracker.on_file_done(0, true);
        tracker.restart_speed_window();

        tracker.on_progress(1, 0, 1000, t0 + Duration::from_secs(1));
        let snapshot = tracker.on_progress(1, 500, 1000, t0 + Duration::from_secs(2));
        assert!((snapshot.speed_bps - 500.0).abs() < 0.01);
        assert!((snapshot.eta_seconds - 1.0).abs() < 0.01);
    }

    #[test]
    fn late_ticks_never_move_the_aggregate_back() {
        let mut tracker = tracker([None, None]);
        let t0 = Instant::now();
        tracker.on_progress(0, 600, 1000, t0);
        tracker.on_progress(0, 400, 1000, t0);
        assert_eq!(tracker.snapshot(0).bytes_downloaded, 600);

        tracker.on_file_done(0, true);
        let snapshot = tracker.on_progress(0, 900, 1000, t0);
        assert_eq!(snapshot.bytes_downloaded, 1000);
        assert_eq!(snapshot.total_bytes, 1000);
    }

    #[test]
    fn file_outcomes_are_counted_once() {
        let mut tracker = tracker([Some(10), Some(10)]);

        assert!(tracker.on_file_done(0, true));
        assert!(!tracker.on_file_done(0, false), "second report is ignored");
        assert_eq!(tracker.reported(), 1);
        assert_eq!(tracker.succeeded(), 1);
        assert!(!tracker.is_complete());

        assert!(tracker.on_file_done(1, false));
        assert!(tracker.is_complete());
        assert!(!tracker.on_file_done(7, true), "unknown index is ignored");
    }

    #[test]
    fn completed_file_counts_as_fully_downloaded() {
        let mut tracker = tracker([Some(100)]);
        tracker.on_progress(0, 40, 100, Instant::now());
        tracker.on_file_done(0, true);

        let snapshot = tracker.snapshot(0);
        assert_eq!(snapshot.bytes_downloaded, 100);
        assert!(snapshot.eta_seconds.abs() < f64::EPSILON);
    }

    #[test]
    fn failure_messages() {
        let mut mixed = tracker([None, None, None]);
        mixed.on_file_done(0, true);
        mixed.on_file_done(1, false);
        mixed.on_file_done(2, true);
        assert_eq!(mixed.failure_message().as_deref(), Some("2/3 files completed"));

        let mut all_failed = tracker([None, None]);
        all_failed.on_file_done(0, false);
        all_failed.on_file_done(1, false);
        assert_eq!(all_failed.failure_message().as_deref(), Some("all 2 files failed"));

        let mut ok = tracker([None]);
        ok.on_file_done(0, true);
        assert_eq!(ok.failure_message(), None);
    }
}

//! Byte-range segments of a single file.

use serde::{Deserialize, Serialize};

use super::types::DownloadId;

/// Status of a single segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Created, never started.
    Pending,
    /// Being transferred, or interrupted mid-transfer (resumable).
    Downloading,
    /// Every byte of the range is on disk.
    Completed,
    /// Retries exhausted or unrecoverable error.
    Failed,
}

impl SegmentStatus {
    /// Convert to string representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A contiguous byte range of one file, persisted independently for resume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Owning download.
    pub download_id: DownloadId,
    /// Position within the file (0-based).
    pub index: u32,
    /// First byte of the range.
    pub start_byte: u64,
    /// Last byte of the range (inclusive).
    pub end_byte: u64,
    /// Bytes persisted so far, relative to `start_byte`.
    pub downloaded_bytes: u64,
    /// Current status.
    pub status: SegmentStatus,
}

impl Segment {
    /// Number of bytes in the range.
    #[must_use]
    pub const fn range_len(&self) -> u64 {
        self.end_byte - self.start_byte + 1
    }

    /// Bytes still to fetch.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.range_len().saturating_sub(self.downloaded_bytes)
    }

    /// Absolute offset the next range request must start at.
    #[must_use]
    pub const fn resume_offset(&self) -> u64 {
        self.start_byte + self.downloaded_bytes
    }

    /// Whether every byte has been persisted.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.downloaded_bytes >= self.range_len()
    }
}

/// Split `[0, total_size)` into `count` contiguous, near-equal segments.
///
/// The last segment absorbs the remainder. `count` is clamped to `total_size` so
/// no segment is empty; a zero-byte file yields no segments at all.
#[must_use]
pub fn partition(download_id: &DownloadId, total_size: u64, count: u32) -> Vec<Segment> {
    if total_size == 0 {
        return Vec::new();
    }
    let count = u64::from(count.max(1)).min(total_size);
    let base = total_size / count;

    (0..count)
        .map(|i| {
            let start_byte = i * base;
            let end_byte = if i + 1 == count {
                total_size - 1
            } else {
                start_byte + base - 1
            };
            Segment {
                download_id: download_id.clone(),
                index: u32::try_from(i).unwrap_or(u32::MAX),
                start_byte,
                end_byte,
                downloaded_bytes: 0,
                status: SegmentStatus::Pending,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> DownloadId {
        DownloadId::new("1", "installer")
    }

    fn assert_exact_cover(segments: &[Segment], total: u64) {
        let mut expected_start = 0;
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index as usize, i, "ordered by index");
            assert_eq!(segment.start_byte, expected_start, "no gaps or overlaps");
            assert!(segment.end_byte >= segment.start_byte);
            expected_start = segment.end_byte + 1;
        }
        assert_eq!(expected_start, total, "covers the whole file");
    }

    #[test]
    fn partition_covers_range_for_many_shapes() {
        for total in [1u64, 2, 3, 7, 1000, 1001, 10 * 1024 * 1024 + 3] {
            for count in 1u32..=9 {
                let segments = partition(&id(), total, count);
                assert_exact_cover(&segments, total);
                assert_eq!(segments.last().unwrap().end_byte, total - 1);
            }
        }
    }

    #[test]
    fn last_segment_absorbs_remainder() {
        let segments = partition(&id(), 10, 4);
        let lens: Vec<u64> = segments.iter().map(Segment::range_len).collect();
        assert_eq!(lens, vec![2, 2, 2, 4]);
    }

    #[test]
    fn count_is_clamped_to_size() {
        let segments = partition(&id(), 3, 8);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.range_len() == 1));
    }

    #[test]
    fn zero_byte_file_has_no_segments() {
        assert!(partition(&id(), 0, 4).is_empty());
    }

    #[test]
    fn resume_offset_and_remaining() {
        let mut segment = partition(&id(), 1000, 4).remove(1);
        segment.downloaded_bytes = 100;
        assert_eq!(segment.resume_offset(), 350);
        assert_eq!(segment.remaining(), 150);
        assert!(!segment.is_complete());

        segment.downloaded_bytes = segment.range_len();
        assert!(segment.is_complete());
    }

    #[test]
    fn status_round_trips_through_storage_strings() {
        for status in [
            SegmentStatus::Pending,
            SegmentStatus::Downloading,
            SegmentStatus::Completed,
            SegmentStatus::Failed,
        ] {
            assert_eq!(SegmentStatus::parse(status.as_str()), status);
        }
    }
}

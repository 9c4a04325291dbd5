//! Progress record written after every rendered frame.

use serde::{Deserialize, Serialize};

/// Message attached to the final progress record of a successful job.
pub const COMPLETED_MESSAGE: &str = "Video generation completed successfully";

const MAX_IN_FLIGHT_PERCENT: f64 = 99.9;

/// Latest snapshot of frame progress for one job.
///
/// Overwritten wholesale on every update, never appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub frames_generated: u64,
    pub total_frames: u64,
    /// Percentage rounded to one decimal place.
    pub progress_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressRecord {
    /// An in-flight record. The percentage stays below 100 even when every
    /// frame is rendered, since the video still has to be assembled.
    pub fn rendering(frames_generated: u64, total_frames: u64) -> Self {
        Self {
            frames_generated,
            total_frames,
            progress_percent: percent(frames_generated, total_frames).min(MAX_IN_FLIGHT_PERCENT),
            message: None,
        }
    }

    /// The record written once the video has been assembled.
    pub fn completed(total_frames: u64) -> Self {
        Self {
            frames_generated: total_frames,
            total_frames,
            progress_percent: 100.0,
            message: Some(COMPLETED_MESSAGE.to_string()),
        }
    }
}

/// `done / total * 100`, rounded to one decimal place. Zero when `total` is 0.
///
/// Capped at 99.9 until `done == total` so rounding never reports a finished
/// job early.
pub fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = done as f64 / total as f64 * 100.0;
    let rounded = (raw * 10.0).round() / 10.0;
    if done < total {
        rounded.min(MAX_IN_FLIGHT_PERCENT)
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(8, 8), 100.0);
        assert_eq!(percent(0, 8), 0.0);
    }

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent(0, 0), 0.0);
    }

    #[test]
    fn percent_is_non_decreasing() {
        let total = 37;
        let mut last = -1.0;
        for done in 0..=total {
            let p = percent(done, total);
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn only_final_frame_reaches_one_hundred() {
        let total = 160;
        for done in 0..total {
            assert!(percent(done, total) < 100.0, "{done}/{total}");
        }
        assert_eq!(percent(total, total), 100.0);
    }

    #[test]
    fn rounding_never_reaches_one_hundred_early() {
        assert_eq!(percent(1999, 2000), 99.9);
    }

    #[test]
    fn completed_record_has_message() {
        let record = ProgressRecord::completed(8);
        assert_eq!(record.frames_generated, 8);
        assert_eq!(record.progress_percent, 100.0);
        assert_eq!(record.message.as_deref(), Some(COMPLETED_MESSAGE));
    }

    #[test]
    fn in_flight_record_stays_below_one_hundred() {
        let record = ProgressRecord::rendering(8, 8);
        assert_eq!(record.frames_generated, 8);
        assert_eq!(record.progress_percent, 99.9);
    }

    #[test]
    fn message_is_omitted_when_absent() {
        let json = serde_json::to_value(ProgressRecord::rendering(3, 8)).unwrap();
        assert!(json.get("message").is_none());
        assert_eq!(json["progress_percent"], 37.5);
    }
}

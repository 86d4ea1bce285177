//! Per-frame evidence classification and the combined evidence document.

use crate::llm::vision::FrameFailure;
use serde::{Deserialize, Serialize};

/// Phrases that indicate the product was seen in a frame
pub const PRESENCE_KEYWORDS: &[&str] = &[
    "located",
    "visible",
    "is on",
    "can be seen",
    "placed",
    "sitting",
    "present",
    "seen",
];

/// Phrases that veto a presence match
pub const UNCERTAINTY_KEYWORDS: &[&str] = &[
    "not visible",
    "not found",
    "unclear",
    "could be",
    "might be",
    "probably",
];

/// Frames in the last 10% of the video need extra care
const TRAILING_CUTOFF: f64 = 0.9;

/// Result of asking the vision model about one frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FrameOutcome {
    Answered(String),
    Skipped(FrameFailure),
}

impl FrameOutcome {
    /// Text contributed to the evidence document
    pub fn evidence_text(&self) -> String {
        match self {
            FrameOutcome::Answered(text) => text.clone(),
            FrameOutcome::Skipped(failure) => failure.placeholder(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FrameOutcome::Skipped(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameAnalysis {
    pub index: u64,
    pub timestamp_ms: u64,
    pub outcome: FrameOutcome,
}

impl FrameAnalysis {
    fn evidence_entry(&self) -> String {
        format!(
            "Frame {} ({} ms):\n{}",
            self.index,
            self.timestamp_ms,
            self.outcome.evidence_text()
        )
    }
}

/// Whether an answer counts as the product being present at `timestamp_ms`.
///
/// Near the end of the video, any answer containing "end" is dropped. This is
/// a plain substring test, so words like "legend" also trigger it.
pub fn is_positive(text: &str, timestamp_ms: u64, duration_ms: f64) -> bool {
    let lower = text.to_lowercase();

    let present = PRESENCE_KEYWORDS.iter().any(|k| lower.contains(k));
    let uncertain = UNCERTAINTY_KEYWORDS.iter().any(|k| lower.contains(k));
    let before_cutoff = (timestamp_ms as f64) < TRAILING_CUTOFF * duration_ms;

    present && !uncertain && (before_cutoff || !lower.contains("end"))
}

/// Output of aggregation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvidenceReport {
    /// All frame answers, in order, separated by blank lines
    pub document: String,
    /// Timestamps of frames that show the product, in order
    pub timestamps: Vec<u64>,
    pub frames_answered: usize,
    pub frames_skipped: usize,
}

/// Builds the evidence document and the positive timeline
#[derive(Debug, Clone, Copy)]
pub struct EvidenceAggregator {
    fps: f64,
    total_frames: u64,
}

impl EvidenceAggregator {
    pub fn new(fps: f64, total_frames: u64) -> Self {
        Self { fps, total_frames }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.fps > 0.0 {
            (self.total_frames as f64 / self.fps) * 1000.0
        } else {
            0.0
        }
    }

    /// Skipped frames are never positive
    pub fn classify(&self, analysis: &FrameAnalysis) -> bool {
        match &analysis.outcome {
            FrameOutcome::Answered(text) => is_positive(text, analysis.timestamp_ms, self.duration_ms()),
            FrameOutcome::Skipped(_) => false,
        }
    }

    pub fn aggregate(&self, analyses: &[FrameAnalysis]) -> EvidenceReport {
        let document = analyses
            .iter()
            .map(FrameAnalysis::evidence_entry)
            .collect::<Vec<_>>()
            .join("\n\n");

        let timestamps = analyses
            .iter()
            .filter(|a| self.classify(a))
            .map(|a| a.timestamp_ms)
            .collect();

        let frames_skipped = analyses.iter().filter(|a| a.outcome.is_skipped()).count();

        EvidenceReport {
            document,
            timestamps,
            frames_answered: analyses.len() - frames_skipped,
            frames_skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::vision::FrameErrorKind;

    fn answered(index: u64, timestamp_ms: u64, text: &str) -> FrameAnalysis {
        FrameAnalysis {
            index,
            timestamp_ms,
            outcome: FrameOutcome::Answered(text.to_string()),
        }
    }

    #[test]
    fn test_presence_and_uncertainty() {
        assert!(is_positive("Tide is located on the second shelf.", 1000, 10_000.0));
        assert!(is_positive("The bottle CAN BE SEEN near the top.", 1000, 10_000.0));
        assert!(!is_positive("The product might be located on the top shelf", 1000, 10_000.0));
        assert!(!is_positive("Tide is not visible in this frame.", 1000, 10_000.0));
        assert!(!is_positive("Only shampoo bottles here.", 1000, 10_000.0));
    }

    #[test]
    fn test_trailing_window_end_substring() {
        // 9500 ms of a 10 s video is past the cutoff
        assert!(!is_positive("Tide is placed at the end of the aisle.", 9500, 10_000.0));
        assert!(!is_positive("Tide is placed next to the legend board.", 9500, 10_000.0));
        assert!(is_positive("Tide is placed on the top shelf.", 9500, 10_000.0));
        assert!(is_positive("Tide is placed at the end of the aisle.", 1000, 10_000.0));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let text = "Surf Excel is sitting on the middle shelf.";
        let first = is_positive(text, 4000, 8000.0);
        assert!((0..10).all(|_| is_positive(text, 4000, 8000.0) == first));
    }

    #[test]
    fn test_aggregate_document_and_timeline() {
        let aggregator = EvidenceAggregator::new(1.0, 10);
        let analyses = vec![
            answered(0, 0, "Tide is located on shelf"),
            FrameAnalysis {
                index: 1,
                timestamp_ms: 1000,
                outcome: FrameOutcome::Skipped(FrameFailure::new(
                    FrameErrorKind::Timeout,
                    Some(1),
                    "Timeout",
                    "timed out",
                )),
            },
            answered(2, 2000, "Tide is not visible"),
        ];

        let report = aggregator.aggregate(&analyses);
        assert_eq!(report.timestamps, vec![0]);
        assert_eq!(report.frames_answered, 2);
        assert_eq!(report.frames_skipped, 1);
        assert_eq!(
            report.document,
            "Frame 0 (0 ms):\nTide is located on shelf\n\n\
             Frame 1 (1000 ms):\n[Skipped frame 1 due to timeout. Try again later.]\n\n\
             Frame 2 (2000 ms):\nTide is not visible"
        );
    }

    #[test]
    fn test_skipped_frame_never_positive() {
        let aggregator = EvidenceAggregator::new(1.0, 10);
        let failure = FrameFailure::new(FrameErrorKind::Other, Some(3), "ApiError", "product is located here");
        let analysis = FrameAnalysis {
            index: 3,
            timestamp_ms: 3000,
            outcome: FrameOutcome::Skipped(failure),
        };
        assert!(!aggregator.classify(&analysis));
    }

    #[test]
    fn test_empty_input() {
        let report = EvidenceAggregator::new(30.0, 0).aggregate(&[]);
        assert!(report.document.is_empty());
        assert!(report.timestamps.is_empty());
    }
}

use crate::pipeline::{
    aggregator::{Aggregation, FrameResult, SkippedFrame},
    detection::DetectionBox,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleFileResponse {
    pub status: ResponseStatus,
    pub results: Vec<Option<DetectionBox>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub status: ResponseStatus,
    pub results: Vec<FrameResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectionResponse {
    Single(SingleFileResponse),
    Batch(BatchResponse),
}

impl DetectionResponse {
    pub fn skipped_frames(&self) -> usize {
        match self {
            DetectionResponse::Single(_) => 0,
            DetectionResponse::Batch(batch) => batch.skipped.len(),
        }
    }
}

/// Detections of the frame whose path is exactly `requested_path`, or none.
pub fn assemble_single(aggregation: Aggregation, requested_path: &str) -> SingleFileResponse {
    let results = aggregation
        .frames
        .into_iter()
        .find(|frame| frame.source_path == requested_path)
        .map(|frame| frame.detections)
        .unwrap_or_default();

    SingleFileResponse {
        status: ResponseStatus::Success,
        results,
    }
}

pub fn assemble_batch(aggregation: Aggregation) -> BatchResponse {
    BatchResponse {
        status: ResponseStatus::Success,
        results: aggregation.frames,
        skipped: aggregation.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(path: &str, frame_number: u64, label: &str) -> FrameResult {
        FrameResult {
            source_path: path.into(),
            frame_number,
            detections: vec![Some(DetectionBox {
                label: label.into(),
                confidence: 0.5,
                bbox: [0.0, 0.0, 1.0, 1.0],
            })],
        }
    }

    #[test]
    fn test_single_returns_only_the_requested_file() {
        let aggregation = Aggregation {
            frames: vec![frame("a.jpg", 0, "cat"), frame("b.jpg", 0, "dog")],
            ..Default::default()
        };

        let response = assemble_single(aggregation, "a.jpg");

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].as_ref().unwrap().label, "cat");
    }

    #[test]
    fn test_single_without_exact_match_is_empty() {
        let aggregation = Aggregation {
            frames: vec![frame("/abs/a.jpg", 0, "cat")],
            ..Default::default()
        };

        let response = assemble_single(aggregation, "a.jpg");

        assert_eq!(response.status, ResponseStatus::Success);
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_batch_keeps_order_and_skips() {
        let aggregation = Aggregation {
            frames: vec![frame("frame_1.jpg", 1, "cat"), frame("frame_2.jpg", 2, "dog")],
            skipped: vec![SkippedFrame {
                path: "frame_3.jpg".into(),
                reason: "unreadable".into(),
            }],
            malformed_detections: 0,
        };

        let response = DetectionResponse::Batch(assemble_batch(aggregation));

        assert_eq!(response.skipped_frames(), 1);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "success",
                "results": [
                    {
                        "file_path": "frame_1.jpg",
                        "frame_number": 1,
                        "confidences": [{ "name": "cat", "confidence": 0.5, "box": [0.0, 0.0, 1.0, 1.0] }]
                    },
                    {
                        "file_path": "frame_2.jpg",
                        "frame_number": 2,
                        "confidences": [{ "name": "dog", "confidence": 0.5, "box": [0.0, 0.0, 1.0, 1.0] }]
                    }
                ],
                "skipped": [{ "file_path": "frame_3.jpg", "reason": "unreadable" }]
            })
        );
    }

    #[test]
    fn test_batch_without_skips_omits_the_field() {
        let response = DetectionResponse::Batch(assemble_batch(Aggregation::default()));

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": "success", "results": [] })
        );
    }
}

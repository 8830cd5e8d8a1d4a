use crate::pipeline::{
    detection::{normalize, DetectionBox},
    sequencer::frame_number_or_default,
};
use detection_engine::RawFrameRecord;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, num::ParseIntError};
use thiserror::Error;

/// What to do with a detection record that cannot be normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Leave the entry out.
    #[default]
    Drop,
    /// Keep its position as a `null` entry.
    Placeholder,
}

/// All detections for one image plus its ordering key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    #[serde(rename = "file_path")]
    pub source_path: String,
    pub frame_number: u64,
    /// `None` entries only appear under [`MalformedPolicy::Placeholder`].
    #[serde(rename = "confidences")]
    pub detections: Vec<Option<DetectionBox>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFrame {
    #[serde(rename = "file_path")]
    pub path: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum FrameProcessingError {
    #[error("expected an array of detections, got {0}")]
    UnexpectedPayload(&'static str),
    #[error("frame number does not fit in 64 bits: {0}")]
    FrameNumberOverflow(#[from] ParseIntError),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregation {
    /// Sorted by frame number, ties in arrival order.
    pub frames: Vec<FrameResult>,
    pub skipped: Vec<SkippedFrame>,
    pub malformed_detections: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: MalformedPolicy,
}

fn payload_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl Aggregator {
    pub fn new(policy: MalformedPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MalformedPolicy {
        self.policy
    }

    /// Builds the ordered batch from engine records. Records that cannot be
    /// processed are logged, listed in [`Aggregation::skipped`] and left out.
    pub fn aggregate(&self, records: &[RawFrameRecord]) -> Aggregation {
        let mut aggregation = Aggregation::default();

        for record in records {
            match self.process_record(record) {
                Ok((frame, malformed)) => {
                    aggregation.malformed_detections += malformed;
                    aggregation.frames.push(frame);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", record.path, e);
                    aggregation.skipped.push(SkippedFrame {
                        path: record.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // stable, so equal frame numbers keep the engine's order
        aggregation.frames.sort_by_key(|frame| frame.frame_number);
        log_duplicate_frame_numbers(&aggregation.frames);

        aggregation
    }

    fn process_record(
        &self,
        record: &RawFrameRecord,
    ) -> Result<(FrameResult, usize), FrameProcessingError> {
        let raw_detections = record.detections.as_array().ok_or_else(|| {
            FrameProcessingError::UnexpectedPayload(payload_kind(&record.detections))
        })?;

        let mut malformed = 0;
        let mut detections = Vec::with_capacity(raw_detections.len());
        for (index, raw) in raw_detections.iter().enumerate() {
            match normalize(raw) {
                Ok(detection) => detections.push(Some(detection)),
                Err(e) => {
                    tracing::warn!("{} detection {}: {}", record.path, index, e);
                    malformed += 1;
                    if self.policy == MalformedPolicy::Placeholder {
                        detections.push(None);
                    }
                }
            }
        }

        let frame = FrameResult {
            source_path: record.path.clone(),
            frame_number: frame_number_or_default(&record.path)?,
            detections,
        };

        Ok((frame, malformed))
    }
}

fn log_duplicate_frame_numbers(frames: &[FrameResult]) {
    let mut seen = HashSet::new();
    for frame in frames {
        if !seen.insert(frame.frame_number) {
            tracing::debug!(
                "Frame number {} shared by several sources, including {}",
                frame.frame_number,
                frame.source_path
            );
        }
    }
}

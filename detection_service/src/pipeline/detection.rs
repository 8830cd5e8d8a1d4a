use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionBox {
    #[serde(rename = "name")]
    pub label: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` as reported by the engine.
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
}

#[derive(Error, Debug)]
pub enum DetectionParseError {
    #[error("missing key `{0}` in detection record")]
    MissingField(&'static str),
    #[error("malformed detection record: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawDetection {
    name: Option<String>,
    confidence: Option<f32>,
    #[serde(rename = "box")]
    bbox: Option<RawBox>,
}

#[derive(Deserialize)]
struct RawBox {
    x1: Option<f32>,
    y1: Option<f32>,
    x2: Option<f32>,
    y2: Option<f32>,
}

fn required<T>(value: Option<T>, key: &'static str) -> Result<T, DetectionParseError> {
    value.ok_or(DetectionParseError::MissingField(key))
}

/// Turns one engine detection record into a [`DetectionBox`].
pub fn normalize(raw: &serde_json::Value) -> Result<DetectionBox, DetectionParseError> {
    let raw = RawDetection::deserialize(raw)?;

    let label = required(raw.name, "name")?;
    let confidence = required(raw.confidence, "confidence")?;
    let bbox = required(raw.bbox, "box")?;

    Ok(DetectionBox {
        label,
        confidence,
        bbox: [
            required(bbox.x1, "box.x1")?,
            required(bbox.y1, "box.y1")?,
            required(bbox.x2, "box.x2")?,
            required(bbox.y2, "box.y2")?,
        ],
    })
}

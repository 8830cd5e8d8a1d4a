use crate::{device::DeviceSelector, source::SourceSpec};
use async_trait::async_trait;
use thiserror::Error;

/// Engine output for one image.
///
/// `detections` is the engine's JSON rendering of what it found, normally an
/// array of `{"name", "confidence", "box": {"x1", "y1", "x2", "y2"}}` objects.
/// A `null` payload means the engine could not read the image.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrameRecord {
    pub path: String,
    pub detections: serde_json::Value,
}

impl RawFrameRecord {
    pub fn new(path: impl Into<String>, detections: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            detections,
        }
    }

    pub fn unreadable(path: impl Into<String>) -> Self {
        Self::new(path, serde_json::Value::Null)
    }
}

#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("Invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Engine is bound to {bound} but {requested} was requested")]
    DeviceMismatch {
        bound: DeviceSelector,
        requested: DeviceSelector,
    },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Inference task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Black-box object detector.
///
/// The returned records are in no particular order. Problems with a single
/// image must be reported through that image's record, an `Err` means the
/// whole invocation failed.
#[async_trait]
pub trait DetectionInvoker: Send + Sync + 'static {
    async fn predict(
        &self,
        source: &SourceSpec,
        confidence_threshold: f32,
        device: DeviceSelector,
    ) -> Result<Vec<RawFrameRecord>, InvokerError>;
}

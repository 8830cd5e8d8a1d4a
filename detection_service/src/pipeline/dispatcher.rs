use crate::pipeline::{
    aggregator::Aggregator,
    response::{assemble_batch, assemble_single, DetectionResponse},
};
use detection_engine::{DetectionInvoker, DeviceSelector, InvokerError, SourceSpec};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// A detection request as received, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionRequest {
    SingleFile { path: String },
    MultipleFiles { paths: Vec<String> },
    Directory { pattern: String },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidRequest(&'static str),
    #[error("Detection engine failed: {0}")]
    Invoker(#[from] InvokerError),
}

impl TryFrom<DetectionRequest> for SourceSpec {
    type Error = DispatchError;

    fn try_from(request: DetectionRequest) -> Result<Self, Self::Error> {
        match request {
            DetectionRequest::SingleFile { path } if path.is_empty() => {
                Err(DispatchError::InvalidRequest("No filename in the request"))
            }
            DetectionRequest::SingleFile { path } => Ok(SourceSpec::SingleFile(path)),
            DetectionRequest::MultipleFiles { paths }
                if paths.is_empty() || paths.iter().any(String::is_empty) =>
            {
                Err(DispatchError::InvalidRequest("No files_path in the request"))
            }
            DetectionRequest::MultipleFiles { paths } => Ok(SourceSpec::MultipleFiles(paths)),
            DetectionRequest::Directory { pattern } if pattern.is_empty() => {
                Err(DispatchError::InvalidRequest("No folder_path in the request"))
            }
            DetectionRequest::Directory { pattern } => Ok(SourceSpec::Directory(pattern)),
        }
    }
}

/// Per-request numbers the caller may want to report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub records: usize,
    pub frames: usize,
    pub skipped_frames: usize,
    pub malformed_detections: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub response: DetectionResponse,
    pub stats: DispatchStats,
}

/// Validates requests, runs the engine and shapes its output.
#[derive(Clone)]
pub struct Dispatcher {
    invoker: Arc<dyn DetectionInvoker>,
    aggregator: Aggregator,
    device: DeviceSelector,
}

impl Dispatcher {
    pub fn new(
        invoker: Arc<dyn DetectionInvoker>,
        aggregator: Aggregator,
        device: DeviceSelector,
    ) -> Self {
        Self {
            invoker,
            aggregator,
            device,
        }
    }

    pub fn device(&self) -> DeviceSelector {
        self.device
    }

    #[instrument(skip(self))]
    pub async fn dispatch(
        &self,
        request: DetectionRequest,
        confidence_threshold: f32,
    ) -> Result<Dispatched, DispatchError> {
        let source = SourceSpec::try_from(request)?;

        let records = self
            .invoker
            .predict(&source, confidence_threshold, self.device)
            .await?;
        tracing::debug!("Engine returned {} records for {}", records.len(), source.kind());

        let aggregation = self.aggregator.aggregate(&records);
        let stats = DispatchStats {
            records: records.len(),
            frames: aggregation.frames.len(),
            skipped_frames: aggregation.skipped.len(),
            malformed_detections: aggregation.malformed_detections,
        };

        let response = match &source {
            SourceSpec::SingleFile(path) => {
                DetectionResponse::Single(assemble_single(aggregation, path))
            }
            SourceSpec::MultipleFiles(_) | SourceSpec::Directory(_) => {
                DetectionResponse::Batch(assemble_batch(aggregation))
            }
        };

        Ok(Dispatched { response, stats })
    }
}

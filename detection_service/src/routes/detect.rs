use crate::{
    pipeline::{DetectionRequest, DetectionResponse, DispatchError},
    server::SharedState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct SingleFileRequest {
    #[serde(default)]
    pub filename: String,
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct MultipleFilesRequest {
    #[serde(default)]
    pub files_path: Vec<String>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct BatchFolderRequest {
    #[serde(default)]
    pub folder_path: String,
    pub threshold: Option<f32>,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(&'static str),
    #[error("An error occurred")]
    Internal,
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidRequest(detail) => ApiError::InvalidRequest(detail),
            DispatchError::Invoker(e) => {
                tracing::error!("Detection failed: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn run(
    state: &SharedState,
    route: &str,
    request: DetectionRequest,
    threshold: Option<f32>,
) -> Result<Json<DetectionResponse>, ApiError> {
    state.metrics.record_request(route);
    let threshold = threshold.unwrap_or(state.default_threshold);

    let started = Instant::now();
    let dispatched = state.dispatcher.dispatch(request, threshold).await?;
    state
        .metrics
        .record_invocation_duration(started.elapsed().as_millis() as u64, route);
    state
        .metrics
        .record_skipped_frames(dispatched.stats.skipped_frames, route);
    state
        .metrics
        .record_malformed_detections(dispatched.stats.malformed_detections, route);

    tracing::info!(
        "{}: {} frames, {} skipped, {} malformed detections",
        route,
        dispatched.stats.frames,
        dispatched.stats.skipped_frames,
        dispatched.stats.malformed_detections
    );

    Ok(Json(dispatched.response))
}

#[instrument(skip(state))]
pub async fn detect_single_file(
    State(state): State<SharedState>,
    Json(request): Json<SingleFileRequest>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let detection_request = DetectionRequest::SingleFile {
        path: request.filename,
    };
    run(&state, "detect_single_file", detection_request, request.threshold).await
}

#[instrument(skip(state))]
pub async fn detect_multiple_files(
    State(state): State<SharedState>,
    Json(request): Json<MultipleFilesRequest>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let detection_request = DetectionRequest::MultipleFiles {
        paths: request.files_path,
    };
    run(&state, "detect_multiple_files", detection_request, request.threshold).await
}

#[instrument(skip(state))]
pub async fn detect_batch_folder(
    State(state): State<SharedState>,
    Json(request): Json<BatchFolderRequest>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let detection_request = DetectionRequest::Directory {
        pattern: request.folder_path,
    };
    run(&state, "detect_batch_folder", detection_request, request.threshold).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{Aggregator, Dispatcher, MalformedPolicy},
        telemetry::Metrics,
    };
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use detection_engine::{
        DetectionInvoker, DeviceSelector, InvokerError, RawFrameRecord, SourceSpec,
    };
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[derive(Default)]
    struct MockInvoker {
        calls: AtomicUsize,
        thresholds: Mutex<Vec<f32>>,
        fail: bool,
    }

    #[async_trait]
    impl DetectionInvoker for MockInvoker {
        async fn predict(
            &self,
            source: &SourceSpec,
            confidence_threshold: f32,
            _device: DeviceSelector,
        ) -> Result<Vec<RawFrameRecord>, InvokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.thresholds.lock().unwrap().push(confidence_threshold);
            if self.fail {
                return Err(InvokerError::Inference("device lost at 0x7f3a".into()));
            }

            let detections = json!([{
                "name": "person",
                "confidence": 0.5,
                "box": { "x1": 10.0, "y1": 20.0, "x2": 100.0, "y2": 200.0 }
            }]);
            let paths = match source {
                SourceSpec::SingleFile(path) => vec![path.clone(), "other.jpg".to_string()],
                SourceSpec::MultipleFiles(paths) => paths.clone(),
                SourceSpec::Directory(_) => {
                    vec!["frame_2.jpg".to_string(), "frame_1.jpg".to_string()]
                }
            };
            Ok(paths
                .into_iter()
                .map(|path| RawFrameRecord::new(path, detections.clone()))
                .collect())
        }
    }

    fn state(invoker: Arc<MockInvoker>) -> SharedState {
        SharedState {
            dispatcher: Arc::new(Dispatcher::new(
                invoker,
                Aggregator::new(MalformedPolicy::Drop),
                DeviceSelector::Cpu,
            )),
            default_threshold: 0.25,
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_single_file_response_shape() {
        let invoker = Arc::new(MockInvoker::default());
        let request = SingleFileRequest {
            filename: "a.jpg".into(),
            threshold: Some(0.05),
        };

        let Json(response) = detect_single_file(State(state(invoker.clone())), Json(request))
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "success",
                "results": [{ "name": "person", "confidence": 0.5, "box": [10.0, 20.0, 100.0, 200.0] }]
            })
        );
        assert_eq!(*invoker.thresholds.lock().unwrap(), vec![0.05]);
    }

    #[tokio::test]
    async fn test_batch_folder_is_sorted_and_uses_default_threshold() {
        let invoker = Arc::new(MockInvoker::default());
        let request = BatchFolderRequest {
            folder_path: "frames/*".into(),
            threshold: None,
        };

        let Json(response) = detect_batch_folder(State(state(invoker.clone())), Json(request))
            .await
            .unwrap();

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["results"][0]["file_path"], "frame_1.jpg");
        assert_eq!(value["results"][1]["frame_number"], 2);
        assert_eq!(*invoker.thresholds.lock().unwrap(), vec![0.25]);
    }

    #[tokio::test]
    async fn test_multiple_files_uses_batch_shape() {
        let invoker = Arc::new(MockInvoker::default());
        let request = MultipleFilesRequest {
            files_path: vec!["frame_7.jpg".into(), "frame_3.jpg".into()],
            threshold: Some(0.5),
        };

        let Json(response) = detect_multiple_files(State(state(invoker)), Json(request))
            .await
            .unwrap();

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["results"][0]["file_path"], "frame_3.jpg");
        assert_eq!(value["results"][1]["confidences"][0]["name"], "person");
    }

    #[tokio::test]
    async fn test_empty_folder_path_is_a_client_error() {
        let invoker = Arc::new(MockInvoker::default());
        let request: BatchFolderRequest =
            serde_json::from_value(json!({ "threshold": 0.3 })).unwrap();

        let err = detect_batch_folder(State(state(invoker.clone())), Json(request))
            .await
            .unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "No folder_path in the request" })
        );
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_does_not_leak_details() {
        let invoker = Arc::new(MockInvoker {
            fail: true,
            ..Default::default()
        });
        let request = SingleFileRequest {
            filename: "a.jpg".into(),
            threshold: None,
        };

        let err = detect_single_file(State(state(invoker)), Json(request))
            .await
            .unwrap_err();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({ "detail": "An error occurred" }));
    }
}

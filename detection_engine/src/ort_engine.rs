use crate::{
    config::{EngineConfig, Validatable},
    device::DeviceSelector,
    invoker::{DetectionInvoker, InvokerError, RawFrameRecord},
    labels::{load_labels, ClassLabels},
    source::SourceSpec,
};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{s, Array, ArrayView2, Axis, Ix3, Ix4};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
    },
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Failed to load labels: {0}")]
    Labels(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Detection {
    class_id: usize,
    confidence: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

fn intersection(box1: &Detection, box2: &Detection) -> f32 {
    let width = (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.);
    let height = (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.);
    width * height
}

fn union(box1: &Detection, box2: &Detection) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn non_max_suppression(mut boxes: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result = Vec::new();

    // `best` always overlaps itself, so every pass shrinks `boxes`
    while let Some(&best) = boxes.first() {
        result.push(best);
        boxes.retain(|candidate| {
            intersection(&best, candidate) / union(&best, candidate) < iou_threshold
        });
    }

    result
}

fn transform_image(image: &DynamicImage, input_size: u32) -> Array<f32, Ix4> {
    let img = image.resize_exact(input_size, input_size, FilterType::CatmullRom);
    let size = input_size as usize;

    let mut input = Array::zeros((1, 3, size, size));
    for pixel in img.pixels() {
        let x = pixel.0 as _;
        let y = pixel.1 as _;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

/// Decodes a YOLOv8 `[N, 4 + classes]` view (center, size, class scores) into
/// boxes in original image coordinates.
fn decode_output(
    output: ArrayView2<f32>,
    min_probability: f32,
    input_size: u32,
    img_width: u32,
    img_height: u32,
) -> Vec<Detection> {
    let scale_x = img_width as f32 / input_size as f32;
    let scale_y = img_height as f32 / input_size as f32;
    let mut boxes = Vec::new();

    for row in output.axis_iter(Axis(0)) {
        let row: Vec<_> = row.iter().copied().collect();
        let Some((class_id, prob)) = row
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
        else {
            continue;
        };

        if prob < min_probability {
            continue;
        }

        let xc = row[0] * scale_x;
        let yc = row[1] * scale_y;
        let w = row[2] * scale_x;
        let h = row[3] * scale_y;

        boxes.push(Detection {
            class_id,
            confidence: prob,
            x1: xc - w / 2.,
            y1: yc - h / 2.,
            x2: xc + w / 2.,
            y2: yc + h / 2.,
        });
    }

    boxes
}

fn render_detections(detections: &[Detection], labels: &ClassLabels) -> serde_json::Value {
    detections
        .iter()
        .map(|d| {
            json!({
                "name": labels.label_for(d.class_id),
                "class": d.class_id,
                "confidence": d.confidence,
                "box": { "x1": d.x1, "y1": d.y1, "x2": d.x2, "y2": d.y2 },
            })
        })
        .collect()
}

fn execution_provider(device: DeviceSelector) -> ExecutionProviderDispatch {
    match device {
        DeviceSelector::Cpu => CPUExecutionProvider::default().build(),
        DeviceSelector::Cuda(id) => CUDAExecutionProvider::default()
            .with_device_id(id)
            .build(),
    }
}

/// YOLOv8 detector backed by a pool of ONNX Runtime sessions bound to one
/// device.
#[derive(Clone)]
pub struct OrtDetectionEngine {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    labels: Arc<ClassLabels>,
    device: DeviceSelector,
    iou_threshold: f32,
    input_size: u32,
}

impl OrtDetectionEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let labels = load_labels(&config.labels.get_path())?;
        let num_instances = config.model.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_execution_providers([execution_provider(config.device)])?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(config.model.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions on {} with {} labels",
            num_instances,
            config.device,
            labels.len()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            labels: Arc::new(labels),
            device: config.device,
            iou_threshold: config.iou_threshold,
            input_size: config.input_size,
        })
    }

    pub fn device(&self) -> DeviceSelector {
        self.device
    }

    fn run_inference(
        &self,
        input: &Array<f32, Ix4>,
    ) -> Result<ndarray::ArrayD<f32>, InvokerError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| InvokerError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling image with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| InvokerError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| InvokerError::Inference(format!("inference failed: {}", e)))?;

        let (shape, data) = outputs["output0"]
            .try_extract_tensor::<f32>()
            .map_err(|e| InvokerError::Inference(format!("failed to extract tensor: {}", e)))?;

        ndarray::ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| InvokerError::Inference(format!("invalid tensor shape: {}", e)))
    }

    fn detect(
        &self,
        image: &DynamicImage,
        min_probability: f32,
    ) -> Result<Vec<Detection>, InvokerError> {
        let (img_width, img_height) = image.dimensions();
        let input = transform_image(image, self.input_size);

        let output = self
            .run_inference(&input)?
            .into_dimensionality::<Ix3>()
            .map_err(|e| InvokerError::Inference(format!("unexpected output rank: {}", e)))?;

        // [1, 4 + classes, anchors] -> [anchors, 4 + classes]
        let transposed = output.t();
        let rows = transposed.slice(s![.., .., 0]);
        let boxes = decode_output(rows, min_probability, self.input_size, img_width, img_height);

        Ok(non_max_suppression(boxes, self.iou_threshold))
    }

    fn predict_blocking(
        &self,
        source: &SourceSpec,
        min_probability: f32,
    ) -> Result<Vec<RawFrameRecord>, InvokerError> {
        let paths = source.resolve()?;
        tracing::debug!("Running detection on {} images", paths.len());

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let image = match image::open(&path) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!("Failed to read image {}: {}", path, e);
                    records.push(RawFrameRecord::unreadable(path));
                    continue;
                }
            };

            let detections = self.detect(&image, min_probability)?;
            tracing::debug!("{}: {} detections", path, detections.len());
            records.push(RawFrameRecord::new(
                path,
                render_detections(&detections, &self.labels),
            ));
        }

        Ok(records)
    }
}

#[async_trait]
impl DetectionInvoker for OrtDetectionEngine {
    async fn predict(
        &self,
        source: &SourceSpec,
        confidence_threshold: f32,
        device: DeviceSelector,
    ) -> Result<Vec<RawFrameRecord>, InvokerError> {
        if device != self.device {
            return Err(InvokerError::DeviceMismatch {
                bound: self.device,
                requested: device,
            });
        }

        let engine = self.clone();
        let source = source.clone();
        tokio::task::spawn_blocking(move || engine.predict_blocking(&source, confidence_threshold))
            .await?
    }
}

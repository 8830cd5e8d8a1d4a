mod device;
mod invoker;
mod labels;
mod ort_engine;
mod source;

pub mod config;

pub use device::DeviceSelector;
pub use invoker::{DetectionInvoker, InvokerError, RawFrameRecord};
pub use labels::{load_labels, ClassLabels};
pub use ort_engine::{EngineError, OrtDetectionEngine};
pub use source::SourceSpec;

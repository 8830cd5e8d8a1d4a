//! Turns raw engine output into ordered, validated detection responses.

pub mod aggregator;
pub mod detection;
pub mod dispatcher;
pub mod response;
pub mod sequencer;

pub use aggregator::{Aggregation, Aggregator, FrameResult, MalformedPolicy, SkippedFrame};
pub use detection::{normalize, DetectionBox, DetectionParseError};
pub use dispatcher::{DetectionRequest, DispatchError, DispatchStats, Dispatched, Dispatcher};
pub use response::{BatchResponse, DetectionResponse, ResponseStatus, SingleFileResponse};

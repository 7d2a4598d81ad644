mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{CpuBackend, StubBackend, COCO_CLASSES};
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection};

/// Detector-level confidence threshold used unless configured otherwise.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

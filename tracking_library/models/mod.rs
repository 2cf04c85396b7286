//! Predictor capabilities and their configuration
//!
//! - **predictor**: the traits the nodes drive
//! - **config**: parameters read at startup, device selection and predictor loading
//! - **grounding**: runtime-independent Grounding DINO pre/post-processing
//! - **onnx**: ONNX Runtime implementations (feature `onnx`)

pub mod config;
pub mod grounding;
pub mod predictor;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use config::{CutieConfig, DetectionSettings, Device, GroundingDinoConfig};
pub use predictor::{DetectionPredictor, SegmentationPredictor};

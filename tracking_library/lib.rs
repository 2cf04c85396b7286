//! # Tracking Library
//!
//! Video object tracking (Cutie) and open-vocabulary detection
//! (Grounding DINO) as nodes on the tracking_core runtime.
//!
//! ## Structure
//!
//! ```text
//! tracking_library/
//! ── messages/       # Image, label, box and reconfiguration messages
//! ── algorithms/     # NMS and label-map utilities
//! ── vision/         # Image bridge, palette overlay, box annotation
//! ── models/         # Predictor traits, configuration, ONNX backends
//! ── nodes/          # CutieNode, GroundingDinoNode, playback, recording
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! // Message types, traits, and nodes are re-exported at the root for convenience
//! use tracking_library::{CutieNode, GroundingDinoNode, Image, LabelArray, LogSummary};
//!
//! // Or import from specific modules
//! use tracking_library::algorithms::nms;
//! use tracking_library::models::{DetectionPredictor, SegmentationPredictor};
//! ```
//!
//! The ONNX Runtime predictors are behind the `onnx` feature (`cuda` for GPU
//! execution). Without it, nodes still run with any injected predictor.

pub mod algorithms;
pub mod messages;
pub mod models;
pub mod nodes;
pub mod vision;

// Re-export core traits needed for message types
pub use tracking_core::core::LogSummary;

// Re-export message types at the crate root for convenience
pub use messages::*;

pub use models::{DetectionPredictor, SegmentationPredictor};
pub use nodes::{CutieNode, GroundingDinoNode, ImagePlayer, ResultRecorderNode};

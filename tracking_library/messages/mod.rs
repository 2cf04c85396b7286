//! Message types exchanged by the tracking and detection nodes
//!
//! Messages are organized by domain:
//! - Standard: `Header` and `Time` stamps
//! - Sensor: raw `Image` frames and their pixel encodings
//! - Recognition: boxes, labels and classification summaries
//! - Reconfigure: runtime detection settings
//!
//! All message types are re-exported at the crate root for convenience.

pub mod reconfigure;
pub mod recognition;
pub mod sensor;
pub mod std_msgs;

pub use reconfigure::GroundingDinoReconfig;
pub use recognition::{ClassificationResult, Label, LabelArray, Rect, RectArray};
pub use sensor::{Image, ImageEncoding};
pub use std_msgs::{Header, Time};

//! Runtime reconfiguration of the detection node

use serde::{Deserialize, Serialize};
use tracking_core::core::LogSummary;

/// New detection settings, sent on `~set_parameters`
///
/// `classes` is a single semicolon-separated string (`"cup; bottle"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingDinoReconfig {
    pub classes: String,
    pub box_threshold: f64,
    pub text_threshold: f64,
    pub nms_threshold: f64,
}

impl Default for GroundingDinoReconfig {
    fn default() -> Self {
        Self {
            classes: String::new(),
            box_threshold: 0.3,
            text_threshold: 0.25,
            nms_threshold: 0.5,
        }
    }
}

impl LogSummary for GroundingDinoReconfig {
    fn log_summary(&self) -> String {
        format!(
            "Reconfig(classes='{}', box={:.2}, text={:.2}, nms={:.2})",
            self.classes, self.box_threshold, self.text_threshold, self.nms_threshold
        )
    }
}

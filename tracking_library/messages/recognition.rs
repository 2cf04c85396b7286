//! Detection results: boxes, labels and classification summaries

use super::std_msgs::Header;
use serde::{Deserialize, Serialize};
use tracking_core::core::LogSummary;

/// Axis-aligned box given by its center and size in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Center x
    pub x: i32,
    /// Center y
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Convert corner coordinates, truncating toward zero
    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: ((x1 + x2) / 2.0) as i32,
            y: ((y1 + y2) / 2.0) as i32,
            width: (x2 - x1) as i32,
            height: (y2 - y1) as i32,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RectArray {
    pub header: Header,
    pub rects: Vec<Rect>,
}

/// One detected object's label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelArray {
    pub header: Header,
    pub labels: Vec<Label>,
}

/// Per-detection class assignment with the vocabulary it was drawn from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub header: Header,
    pub classifier: String,
    pub target_names: Vec<String>,
    /// Index into `target_names` per detection
    pub labels: Vec<i32>,
    pub label_names: Vec<String>,
    pub label_proba: Vec<f64>,
}

impl LogSummary for RectArray {
    fn log_summary(&self) -> String {
        format!("RectArray({} rects, frame={})", self.rects.len(), self.header.frame_id)
    }
}

impl LogSummary for LabelArray {
    fn log_summary(&self) -> String {
        let names: Vec<&str> = self.labels.iter().map(|l| l.name.as_str()).collect();
        format!("LabelArray([{}], frame={})", names.join(", "), self.header.frame_id)
    }
}

impl LogSummary for ClassificationResult {
    fn log_summary(&self) -> String {
        format!(
            "ClassificationResult({}, {} labels of {} classes)",
            self.classifier,
            self.labels.len(),
            self.target_names.len()
        )
    }
}

//! Non-Maximum Suppression
//!
//! Class-agnostic greedy suppression of overlapping detections.
//!
//! # Example
//!
//! ```rust
//! use tracking_library::algorithms::nms::{nms, BoundingBox, Detection};
//!
//! let detections = vec![
//!     Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0, 0.9),
//!     Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 8.0), 0, 0.4),
//! ];
//! assert_eq!(nms(&detections, 0.5), vec![0]);
//! ```

use serde::{Deserialize, Serialize};

/// Box in corner form (`x1, y1` top-left, `x2, y2` bottom-right), in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create from center and size
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Clamp all corners into a `width` x `height` image
    pub fn clamp_to(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// One detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Index into the class list the detector was queried with
    pub class_id: usize,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: usize, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// Intersection over union; boxes without area never overlap
pub fn box_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter = a.intersection_area(b);
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy non-maximum suppression
///
/// Returns indices of kept detections ordered by descending confidence. A
/// detection is suppressed when its IoU with an already kept one is strictly
/// greater than `iou_threshold`.
pub fn nms(detections: &[Detection], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| {
        detections[b]
            .confidence
            .total_cmp(&detections[a].confidence)
    });

    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    for index in order {
        let candidate = &detections[index].bbox;
        let suppressed = keep
            .iter()
            .any(|&kept| box_iou(&detections[kept].bbox, candidate) > iou_threshold);
        if !suppressed {
            keep.push(index);
        }
    }
    keep
}

/// Apply [`nms`] and return the surviving detections in kept order
pub fn suppress(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    nms(detections, iou_threshold)
        .into_iter()
        .map(|index| detections[index].clone())
        .collect()
}

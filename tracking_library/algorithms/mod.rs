//! Pure computational algorithms for the perception nodes
//!
//! No I/O: everything here is plain computation over boxes and label maps,
//! shared by the nodes and the predictor backends.
//!
//! # Available Algorithms
//!
//! - **nms**: boxes, IoU and class-agnostic non-maximum suppression
//! - **mask**: label-map utilities (unique labels, one-hot, argmax, boxes)

pub mod mask;
pub mod nms;

pub use mask::{
    argmax_labels, foreground_boxes, mask_to_xyxy, one_hot_foreground, unique_labels, with_background,
};
pub use nms::{box_iou, nms, BoundingBox, Detection};

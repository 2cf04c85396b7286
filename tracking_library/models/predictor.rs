//! Predictor capabilities consumed by the nodes
//!
//! The nodes never see model internals; they drive these traits. ONNX
//! Runtime implementations live in [`super::onnx`] behind the `onnx`
//! feature, and tests plug in scripted fakes.

use crate::algorithms::nms::Detection;
use image::RgbImage;
use ndarray::{Array3, ArrayView3};
use tracking_core::error::TrackingResult;

/// Video object segmentation: one call per frame, state kept inside
pub trait SegmentationPredictor: Send {
    /// Advance the tracker by one frame
    ///
    /// `image` is `[3, H, W]` with values in `0.0..=1.0`. Passing `mask`
    /// (`[k, H, W]` one-hot foreground planes, background excluded) seeds the
    /// tracker with `k` objects. Returns `[k + 1, H, W]` probabilities, channel
    /// `0` being background.
    fn step(
        &mut self,
        image: ArrayView3<f32>,
        mask: Option<ArrayView3<f32>>,
    ) -> TrackingResult<Array3<f32>>;

    /// Number of tracked objects, zero before seeding
    fn num_objects(&self) -> usize;
}

/// Open-vocabulary detection over a class list
pub trait DetectionPredictor: Send {
    /// Detect instances of `classes` in an RGB frame
    ///
    /// Each returned detection's `class_id` indexes `classes`. Candidates
    /// whose phrase matches no class are not returned.
    fn predict_with_classes(
        &mut self,
        image: &RgbImage,
        classes: &[String],
        box_threshold: f32,
        text_threshold: f32,
    ) -> TrackingResult<Vec<Detection>>;
}

//! Fake predictors and message builders shared by the node tests
#![allow(dead_code)]

use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3, ArrayView3};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracking_core::error::{TrackingError, TrackingResult};
use tracking_library::algorithms::nms::Detection;
use tracking_library::algorithms::with_background;
use tracking_library::models::{CutieConfig, DetectionSettings, Device, GroundingDinoConfig};
use tracking_library::vision::{mask_to_image, rgb_to_image};
use tracking_library::{DetectionPredictor, Header, Image, SegmentationPredictor};

/// Replays the seed probabilities for every frame of the seed's size
#[derive(Default)]
pub struct FakeTracker {
    /// Foreground channel count of every seed
    pub seeded_channels: Arc<Mutex<Vec<usize>>>,
    seed: Option<Array3<f32>>,
}

impl SegmentationPredictor for FakeTracker {
    fn step(
        &mut self,
        image: ArrayView3<f32>,
        mask: Option<ArrayView3<f32>>,
    ) -> TrackingResult<Array3<f32>> {
        match mask {
            Some(mask) => {
                self.seeded_channels.lock().unwrap().push(mask.dim().0);
                let prob = with_background(mask);
                self.seed = Some(prob.clone());
                Ok(prob)
            }
            None => {
                let seed = self
                    .seed
                    .as_ref()
                    .ok_or_else(|| TrackingError::Inference("not seeded".to_string()))?;
                if seed.dim().1 != image.dim().1 || seed.dim().2 != image.dim().2 {
                    return Err(TrackingError::InvalidInput("frame size changed".to_string()));
                }
                Ok(seed.clone())
            }
        }
    }

    fn num_objects(&self) -> usize {
        self.seed.as_ref().map(|p| p.dim().0 - 1).unwrap_or(0)
    }
}

/// Returns a fixed detection list and records the classes of every call
#[derive(Default)]
pub struct FakeDetector {
    pub detections: Vec<Detection>,
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl DetectionPredictor for FakeDetector {
    fn predict_with_classes(
        &mut self,
        _image: &RgbImage,
        classes: &[String],
        _box_threshold: f32,
        _text_threshold: f32,
    ) -> TrackingResult<Vec<Detection>> {
        self.calls.lock().unwrap().push(classes.to_vec());
        Ok(self.detections.clone())
    }
}

pub fn cutie_config(with_bbox: bool, init_timeout: Option<Duration>) -> CutieConfig {
    CutieConfig {
        model_path: PathBuf::from("cutie.onnx"),
        device: Device::Cpu,
        intra_threads: 1,
        with_bbox,
        init_timeout,
        font_path: None,
    }
}

pub fn grounding_dino_config(classes: &str) -> GroundingDinoConfig {
    GroundingDinoConfig {
        model_type: "swint".to_string(),
        model_name: "GroundingDINO-swint".to_string(),
        model_path: PathBuf::from("groundingdino.onnx"),
        tokenizer_path: PathBuf::from("tokenizer.json"),
        device: Device::Cpu,
        intra_threads: 1,
        input_size: 800,
        max_size: 1333,
        initial_settings: DetectionSettings {
            classes: DetectionSettings::parse_classes(classes),
            box_threshold: 0.3,
            text_threshold: 0.25,
            nms_threshold: 0.5,
        },
        font_path: None,
    }
}

pub fn frame(width: u32, height: u32, frame_id: &str, seq: u32) -> Image {
    let mut header = Header::new(frame_id);
    header.seq = seq;
    rgb_to_image(&RgbImage::from_pixel(width, height, Rgb([90, 120, 150])), header)
}

pub fn mask(labels: &Array2<i32>, frame_id: &str) -> Image {
    mask_to_image(labels, Header::new(frame_id))
}

/// Wait until `condition` holds, polling every millisecond
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

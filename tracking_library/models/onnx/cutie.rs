//! Cutie video object segmentation on ONNX Runtime
//!
//! The exported step model keeps no state of its own. Each call receives the
//! current frame plus two memory frames (the seed frame and the previous
//! frame) with their object probabilities:
//!
//! | input       | shape            |
//! |-------------|------------------|
//! | `image`     | `[1, 3, H, W]`   |
//! | `ref_image` | `[1, 3, H, W]`   |
//! | `ref_prob`  | `[1, K+1, H, W]` |
//! | `prev_image`| `[1, 3, H, W]`   |
//! | `prev_prob` | `[1, K+1, H, W]` |
//!
//! and returns `prob` `[1, K+1, H, W]`, channel 0 being background.

use super::session::{build_session, inference_error};
use crate::algorithms::mask::with_background;
use crate::models::config::CutieConfig;
use crate::models::predictor::SegmentationPredictor;
use ndarray::{Array3, Array4, ArrayView3, Axis, Ix4};
use ort::session::Session;
use ort::value::Tensor;
use tracking_core::error::{TrackingError, TrackingResult};

struct MemoryFrame {
    image: Array3<f32>,
    prob: Array3<f32>,
}

pub struct OnnxCutie {
    session: Session,
    reference: Option<MemoryFrame>,
    previous: Option<MemoryFrame>,
}

fn batched(tensor: &Array3<f32>) -> Array4<f32> {
    tensor.clone().insert_axis(Axis(0))
}

impl OnnxCutie {
    pub fn load(config: &CutieConfig) -> TrackingResult<Self> {
        let session = build_session(&config.model_path, config.device, config.intra_threads)?;
        Ok(Self {
            session,
            reference: None,
            previous: None,
        })
    }

    fn seed(&mut self, image: ArrayView3<f32>, mask: ArrayView3<f32>) -> TrackingResult<Array3<f32>> {
        if mask.dim().1 != image.dim().1 || mask.dim().2 != image.dim().2 {
            return Err(TrackingError::InvalidInput(format!(
                "Seed mask {:?} does not match image {:?}",
                mask.dim(),
                image.dim()
            )));
        }
        let prob = with_background(mask);
        let frame = MemoryFrame {
            image: image.to_owned(),
            prob: prob.clone(),
        };
        self.previous = Some(MemoryFrame {
            image: frame.image.clone(),
            prob: frame.prob.clone(),
        });
        self.reference = Some(frame);
        Ok(prob)
    }

    fn propagate(&mut self, image: ArrayView3<f32>) -> TrackingResult<Array3<f32>> {
        let (reference, previous) = match (&self.reference, &self.previous) {
            (Some(reference), Some(previous)) => (reference, previous),
            _ => {
                return Err(TrackingError::Inference(
                    "Tracker stepped before it was seeded".to_string(),
                ))
            }
        };
        if image.dim() != reference.image.dim() {
            return Err(TrackingError::InvalidInput(format!(
                "Frame size {:?} differs from the seed frame {:?}",
                image.dim(),
                reference.image.dim()
            )));
        }

        let inputs = ort::inputs![
            "image" => Tensor::from_array(image.to_owned().insert_axis(Axis(0))).map_err(inference_error)?,
            "ref_image" => Tensor::from_array(batched(&reference.image)).map_err(inference_error)?,
            "ref_prob" => Tensor::from_array(batched(&reference.prob)).map_err(inference_error)?,
            "prev_image" => Tensor::from_array(batched(&previous.image)).map_err(inference_error)?,
            "prev_prob" => Tensor::from_array(batched(&previous.prob)).map_err(inference_error)?,
        ];

        let outputs = self.session.run(inputs).map_err(inference_error)?;
        let prob = outputs["prob"]
            .try_extract_array::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<Ix4>()
            .map_err(inference_error)?
            .index_axis(Axis(0), 0)
            .to_owned();
        drop(outputs);

        if prob.dim().0 != reference.prob.dim().0 {
            return Err(TrackingError::Inference(format!(
                "Model returned {} channels, expected {}",
                prob.dim().0,
                reference.prob.dim().0
            )));
        }

        self.previous = Some(MemoryFrame {
            image: image.to_owned(),
            prob: prob.clone(),
        });
        Ok(prob)
    }
}

impl SegmentationPredictor for OnnxCutie {
    fn step(
        &mut self,
        image: ArrayView3<f32>,
        mask: Option<ArrayView3<f32>>,
    ) -> TrackingResult<Array3<f32>> {
        match mask {
            Some(mask) => self.seed(image, mask),
            None => self.propagate(image),
        }
    }

    fn num_objects(&self) -> usize {
        self.reference
            .as_ref()
            .map(|frame| frame.prob.dim().0.saturating_sub(1))
            .unwrap_or(0)
    }
}

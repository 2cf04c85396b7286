//! Grounding DINO open-vocabulary detection on ONNX Runtime
//!
//! Expected model signature:
//!
//! | input            | type   | shape          |
//! |------------------|--------|----------------|
//! | `img`            | f32    | `[1, 3, H, W]` |
//! | `input_ids`      | i64    | `[1, L]`       |
//! | `attention_mask` | bool   | `[1, L]`       |
//! | `position_ids`   | i64    | `[1, L]`       |
//! | `token_type_ids` | i64    | `[1, L]`       |
//! | `text_token_mask`| bool   | `[1, L, L]`    |
//!
//! Outputs are `logits` `[1, Q, 256]` (pre-sigmoid) and `boxes` `[1, Q, 4]`
//! as normalized center/size.

use super::session::{build_session, inference_error};
use crate::algorithms::nms::{BoundingBox, Detection};
use crate::models::config::GroundingDinoConfig;
use crate::models::grounding::{
    caption_from_classes, class_for_phrase, phrase_masks, resize_dims, select_queries, MAX_TEXT_LEN,
    PIXEL_MEAN, PIXEL_STD,
};
use crate::models::predictor::DetectionPredictor;
use image::imageops::{resize, FilterType};
use image::RgbImage;
use ndarray::{Array2, Array3, Array4, Axis, Ix3};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracking_core::error::{TrackingError, TrackingResult};

pub struct OnnxGroundingDino {
    session: Session,
    tokenizer: Tokenizer,
    input_size: u32,
    max_size: u32,
}

impl OnnxGroundingDino {
    pub fn load(config: &GroundingDinoConfig) -> TrackingResult<Self> {
        let tokenizer = Tokenizer::from_file(&config.tokenizer_path).map_err(|e| {
            TrackingError::Model(format!("{}: {}", config.tokenizer_path.display(), e))
        })?;
        let session = build_session(&config.model_path, config.device, config.intra_threads)?;

        Ok(Self {
            session,
            tokenizer,
            input_size: config.input_size,
            max_size: config.max_size,
        })
    }

    fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let (width, height) = resize_dims(image.width(), image.height(), self.input_size, self.max_size);
        let resized = resize(image, width, height, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel.0[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (value - PIXEL_MEAN[c]) / PIXEL_STD[c];
            }
        }
        tensor
    }

    fn decode_phrase(&self, input_ids: &[u32], tokens: &[usize]) -> TrackingResult<String> {
        let ids: Vec<u32> = tokens.iter().map(|&t| input_ids[t]).collect();
        self.tokenizer
            .decode(&ids, true)
            .map_err(|e| TrackingError::Inference(format!("Token decoding failed: {}", e)))
    }
}

impl DetectionPredictor for OnnxGroundingDino {
    fn predict_with_classes(
        &mut self,
        image: &RgbImage,
        classes: &[String],
        box_threshold: f32,
        text_threshold: f32,
    ) -> TrackingResult<Vec<Detection>> {
        if classes.is_empty() || image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let caption = caption_from_classes(classes);
        let encoding = self
            .tokenizer
            .encode(caption.as_str(), true)
            .map_err(|e| TrackingError::Inference(format!("Tokenization failed: {}", e)))?;
        let mut input_ids: Vec<u32> = encoding.get_ids().to_vec();
        input_ids.truncate(MAX_TEXT_LEN);
        let len = input_ids.len();

        let (text_mask, position_ids) = phrase_masks(&input_ids);
        let ids_i64: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let attention: Vec<bool> = encoding.get_attention_mask()[..len].iter().map(|&m| m != 0).collect();
        let type_ids: Vec<i64> = encoding.get_type_ids()[..len].iter().map(|&t| t as i64).collect();

        let row = |values: Vec<i64>| Array2::from_shape_vec((1, len), values);
        let inputs = ort::inputs![
            "img" => Tensor::from_array(self.preprocess(image)).map_err(inference_error)?,
            "input_ids" => Tensor::from_array(row(ids_i64).map_err(inference_error)?).map_err(inference_error)?,
            "attention_mask" => Tensor::from_array(
                Array2::from_shape_vec((1, len), attention).map_err(inference_error)?
            ).map_err(inference_error)?,
            "position_ids" => Tensor::from_array(row(position_ids).map_err(inference_error)?).map_err(inference_error)?,
            "token_type_ids" => Tensor::from_array(row(type_ids).map_err(inference_error)?).map_err(inference_error)?,
            "text_token_mask" => Tensor::from_array(text_mask.insert_axis(Axis(0))).map_err(inference_error)?,
        ];

        let outputs = self.session.run(inputs).map_err(inference_error)?;
        let logits: Array3<f32> = outputs["logits"]
            .try_extract_array::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<Ix3>()
            .map_err(inference_error)?
            .to_owned();
        let boxes: Array3<f32> = outputs["boxes"]
            .try_extract_array::<f32>()
            .map_err(inference_error)?
            .into_dimensionality::<Ix3>()
            .map_err(inference_error)?
            .to_owned();
        drop(outputs);

        let probs = logits.index_axis(Axis(0), 0).mapv(|v| 1.0 / (1.0 + (-v).exp()));
        let boxes = boxes.index_axis(Axis(0), 0);
        let (width, height) = (image.width() as f32, image.height() as f32);

        let mut detections = Vec::new();
        for hit in select_queries(probs.view(), len, box_threshold, text_threshold) {
            let phrase = self.decode_phrase(&input_ids, &hit.tokens)?;
            let Some(class_id) = class_for_phrase(&phrase, classes) else {
                tracing::debug!(phrase = %phrase, score = hit.score, "phrase matches no class");
                continue;
            };
            let b = boxes.row(hit.query);
            let bbox = BoundingBox::from_cxcywh(b[0] * width, b[1] * height, b[2] * width, b[3] * height);
            detections.push(Detection::new(bbox, class_id, hit.score));
        }
        Ok(detections)
    }
}

//! Startup configuration of the predictors
//!
//! Both configs are read once from the node's private parameters (`~key`)
//! and are immutable afterwards; only the detection settings change at
//! runtime, as a whole, through [`DetectionSettings::reconfigured`].

use super::predictor::{DetectionPredictor, SegmentationPredictor};
use crate::messages::GroundingDinoReconfig;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracking_core::error::{TrackingError, TrackingResult};
use tracking_core::params::ParamStore;

pub const DEFAULT_DEVICE: &str = "cuda:0";
pub const DEFAULT_INTRA_THREADS: usize = 4;
pub const DEFAULT_MODEL_TYPE: &str = "swinb";
pub const DEFAULT_INPUT_SIZE: u32 = 800;
pub const DEFAULT_MAX_SIZE: u32 = 1333;

/// Inference device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(i32),
}

impl FromStr for Device {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "cpu" => return Ok(Device::Cpu),
            "cuda" => return Ok(Device::Cuda(0)),
            _ => {}
        }
        s.strip_prefix("cuda:")
            .and_then(|id| id.parse::<i32>().ok())
            .filter(|id| *id >= 0)
            .map(Device::Cuda)
            .ok_or_else(|| {
                TrackingError::Config(format!(
                    "Invalid device '{}': expected cpu, cuda or cuda:<index>",
                    s
                ))
            })
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

fn read_device(params: &ParamStore) -> TrackingResult<Device> {
    params.get_string("~device", DEFAULT_DEVICE)?.parse()
}

fn read_threads(params: &ParamStore) -> TrackingResult<usize> {
    let threads = params.get_i32("~intra_threads", DEFAULT_INTRA_THREADS as i32)?;
    if threads < 1 {
        return Err(TrackingError::Config(format!(
            "~intra_threads must be at least 1, got {}",
            threads
        )));
    }
    Ok(threads as usize)
}

fn read_threshold(params: &ParamStore, key: &str, default: f64) -> TrackingResult<f32> {
    let value = params.get_f64(key, default)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(TrackingError::Config(format!(
            "{} must be within [0, 1], got {}",
            key, value
        )));
    }
    Ok(value as f32)
}

fn read_font_path(params: &ParamStore) -> TrackingResult<Option<PathBuf>> {
    Ok(params.get::<String>("~font_path")?.map(PathBuf::from))
}

/// Tracking node configuration
#[derive(Debug, Clone)]
pub struct CutieConfig {
    pub model_path: PathBuf,
    pub device: Device,
    pub intra_threads: usize,
    /// Draw a box and object index per tracked object
    pub with_bbox: bool,
    /// Bound on the initial mask/frame wait; `None` waits forever
    pub init_timeout: Option<Duration>,
    /// TrueType font for box labels; a system font is searched when unset
    pub font_path: Option<PathBuf>,
}

impl CutieConfig {
    pub fn from_params(params: &ParamStore) -> TrackingResult<Self> {
        let model_path: String = params.require("~model_path")?;

        let init_timeout = match params.get::<f64>("~init_timeout")? {
            None => None,
            Some(secs) if secs > 0.0 && secs.is_finite() => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(TrackingError::Config(format!(
                    "~init_timeout must be a positive number of seconds, got {}",
                    secs
                )))
            }
        };

        Ok(Self {
            model_path: PathBuf::from(model_path),
            device: read_device(params)?,
            intra_threads: read_threads(params)?,
            with_bbox: params.get_bool("~with_bbox", false)?,
            init_timeout,
            font_path: read_font_path(params)?,
        })
    }

    /// Load the tracking model
    #[cfg(feature = "onnx")]
    pub fn get_predictor(&self) -> TrackingResult<Box<dyn SegmentationPredictor>> {
        Ok(Box::new(super::onnx::OnnxCutie::load(self)?))
    }

    #[cfg(not(feature = "onnx"))]
    pub fn get_predictor(&self) -> TrackingResult<Box<dyn SegmentationPredictor>> {
        Err(TrackingError::Config(format!(
            "Cannot load '{}': built without the `onnx` feature",
            self.model_path.display()
        )))
    }
}

/// Class vocabulary and thresholds applied to one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub classes: Vec<String>,
    pub box_threshold: f32,
    pub text_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            box_threshold: 0.3,
            text_threshold: 0.25,
            nms_threshold: 0.5,
        }
    }
}

impl DetectionSettings {
    /// Split a `;`-separated class string, trimming entries and dropping empty ones
    pub fn parse_classes(classes: &str) -> Vec<String> {
        classes
            .split(';')
            .map(str::trim)
            .filter(|class| !class.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Settings after applying a reconfiguration message
    ///
    /// Thresholds are clamped to `[0, 1]`; a NaN or infinite threshold keeps
    /// the value currently in effect.
    pub fn reconfigured(&self, msg: &GroundingDinoReconfig) -> Self {
        let threshold = |value: f64, current: f32| {
            if value.is_finite() {
                value.clamp(0.0, 1.0) as f32
            } else {
                current
            }
        };
        Self {
            classes: Self::parse_classes(&msg.classes),
            box_threshold: threshold(msg.box_threshold, self.box_threshold),
            text_threshold: threshold(msg.text_threshold, self.text_threshold),
            nms_threshold: threshold(msg.nms_threshold, self.nms_threshold),
        }
    }

    pub fn to_reconfig(&self) -> GroundingDinoReconfig {
        GroundingDinoReconfig {
            classes: self.classes.join(";"),
            box_threshold: self.box_threshold as f64,
            text_threshold: self.text_threshold as f64,
            nms_threshold: self.nms_threshold as f64,
        }
    }
}

/// Detection node configuration
#[derive(Debug, Clone)]
pub struct GroundingDinoConfig {
    pub model_type: String,
    /// Reported as the classifier name of classification results
    pub model_name: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub device: Device,
    pub intra_threads: usize,
    /// Target length of the shorter image side
    pub input_size: u32,
    /// Upper bound on the longer image side
    pub max_size: u32,
    /// Settings in effect until the first reconfiguration
    pub initial_settings: DetectionSettings,
    /// TrueType font for box labels; a system font is searched when unset
    pub font_path: Option<PathBuf>,
}

impl GroundingDinoConfig {
    pub fn from_params(params: &ParamStore) -> TrackingResult<Self> {
        let model_type = params.get_string("~model_type", DEFAULT_MODEL_TYPE)?;
        let model_path: String = params.require("~model_path")?;
        let tokenizer_path: String = params.require("~tokenizer_path")?;

        let input_size = params.get_i32("~input_size", DEFAULT_INPUT_SIZE as i32)?;
        let max_size = params.get_i32("~max_size", DEFAULT_MAX_SIZE as i32)?;
        if input_size < 1 || max_size < input_size {
            return Err(TrackingError::Config(format!(
                "Invalid resize bounds: input_size={} max_size={}",
                input_size, max_size
            )));
        }

        let initial_settings = DetectionSettings {
            classes: DetectionSettings::parse_classes(&params.get_string("~classes", "")?),
            box_threshold: read_threshold(params, "~box_threshold", 0.3)?,
            text_threshold: read_threshold(params, "~text_threshold", 0.25)?,
            nms_threshold: read_threshold(params, "~nms_threshold", 0.5)?,
        };

        Ok(Self {
            model_name: format!("GroundingDINO-{}", model_type),
            model_type,
            model_path: PathBuf::from(model_path),
            tokenizer_path: PathBuf::from(tokenizer_path),
            device: read_device(params)?,
            intra_threads: read_threads(params)?,
            input_size: input_size as u32,
            max_size: max_size as u32,
            initial_settings,
            font_path: read_font_path(params)?,
        })
    }

    /// Load the detection model and its tokenizer
    #[cfg(feature = "onnx")]
    pub fn get_predictor(&self) -> TrackingResult<Box<dyn DetectionPredictor>> {
        Ok(Box::new(super::onnx::OnnxGroundingDino::load(self)?))
    }

    #[cfg(not(feature = "onnx"))]
    pub fn get_predictor(&self) -> TrackingResult<Box<dyn DetectionPredictor>> {
        Err(TrackingError::Config(format!(
            "Cannot load '{}': built without the `onnx` feature",
            self.model_path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(name: &str, entries: &[(&str, serde_json::Value)]) -> ParamStore {
        let params = ParamStore::new(name);
        for (key, value) in entries {
            params.set(key, value.clone()).unwrap();
        }
        params
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("gpu".parse::<Device>().is_err());
        assert!("cuda:-1".parse::<Device>().is_err());
        assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
    }

    #[test]
    fn test_cutie_defaults() {
        let params = store("cutie_node", &[("~model_path", "cutie.onnx".into())]);
        let config = CutieConfig::from_params(&params).unwrap();
        assert_eq!(config.model_path, PathBuf::from("cutie.onnx"));
        assert_eq!(config.device, Device::Cuda(0));
        assert!(!config.with_bbox);
        assert_eq!(config.init_timeout, None);
    }

    #[test]
    fn test_cutie_requires_model_path() {
        let params = store("cutie_node", &[]);
        let err = CutieConfig::from_params(&params).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cutie_rejects_bad_timeout() {
        let params = store(
            "cutie_node",
            &[("~model_path", "m.onnx".into()), ("~init_timeout", (-1.0).into())],
        );
        assert!(CutieConfig::from_params(&params).is_err());
    }

    #[test]
    fn test_grounding_dino_config() {
        let params = store(
            "grounding_dino_node",
            &[
                ("~model_path", "gd.onnx".into()),
                ("~tokenizer_path", "tokenizer.json".into()),
                ("~device", "cpu".into()),
                ("~classes", "cup; bottle ;".into()),
            ],
        );
        let config = GroundingDinoConfig::from_params(&params).unwrap();
        assert_eq!(config.model_name, "GroundingDINO-swinb");
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.initial_settings.classes, vec!["cup", "bottle"]);
        assert_eq!(config.initial_settings.box_threshold, 0.3);
        assert_eq!(config.initial_settings.text_threshold, 0.25);
        assert_eq!(config.initial_settings.nms_threshold, 0.5);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let params = store(
            "grounding_dino_node",
            &[
                ("~model_path", "gd.onnx".into()),
                ("~tokenizer_path", "tokenizer.json".into()),
                ("~box_threshold", 1.5.into()),
            ],
        );
        assert!(matches!(
            GroundingDinoConfig::from_params(&params),
            Err(TrackingError::Config(_))
        ));
    }

    #[test]
    fn test_settings_from_reconfig() {
        let settings = DetectionSettings::default().reconfigured(&GroundingDinoReconfig {
            classes: " cup;bottle ".to_string(),
            box_threshold: 0.4,
            text_threshold: 2.0,
            nms_threshold: 0.1,
        });
        assert_eq!(settings.classes, vec!["cup", "bottle"]);
        assert_eq!(settings.text_threshold, 1.0);
        assert_eq!(settings.to_reconfig().classes, "cup;bottle");
    }

    #[test]
    fn test_non_finite_thresholds_keep_current_value() {
        let current = DetectionSettings {
            classes: vec!["cup".to_string()],
            box_threshold: 0.35,
            text_threshold: 0.2,
            nms_threshold: 0.45,
        };
        let settings = current.reconfigured(&GroundingDinoReconfig {
            classes: "cup".to_string(),
            box_threshold: f64::INFINITY,
            text_threshold: 0.3,
            nms_threshold: f64::NAN,
        });
        assert_eq!(settings.box_threshold, 0.35);
        assert_eq!(settings.text_threshold, 0.3);
        assert_eq!(settings.nms_threshold, 0.45);
    }

    #[test]
    fn test_ill_typed_parameter_is_fatal() {
        let params = store(
            "grounding_dino_node",
            &[
                ("~model_path", "gd.onnx".into()),
                ("~tokenizer_path", "tokenizer.json".into()),
                ("~box_threshold", "0.9".into()),
            ],
        );
        assert!(matches!(
            GroundingDinoConfig::from_params(&params),
            Err(TrackingError::Config(_))
        ));

        let params = store(
            "cutie_node",
            &[("~model_path", "cutie.onnx".into()), ("~intra_threads", 2.0.into())],
        );
        assert!(matches!(
            CutieConfig::from_params(&params),
            Err(TrackingError::Config(_))
        ));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_predictor_needs_onnx_feature() {
        let params = store("cutie_node", &[("~model_path", "cutie.onnx".into())]);
        let config = CutieConfig::from_params(&params).unwrap();
        assert!(matches!(config.get_predictor(), Err(TrackingError::Config(_))));
    }
}

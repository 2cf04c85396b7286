//! ONNX Runtime backed predictors

mod session;

pub mod cutie;
pub mod grounding_dino;

pub use cutie::OnnxCutie;
pub use grounding_dino::OnnxGroundingDino;
pub use session::build_session;

//! Image conversion and visualization
//!
//! - **bridge**: `Image` messages to and from RGB buffers, label masks and tensors
//! - **palette**: DAVIS palette mask overlays
//! - **annotate**: boxes with label tabs
//! - **font**: TrueType font loading for labels

pub mod annotate;
pub mod bridge;
pub mod font;
pub mod palette;

pub use annotate::{BoxAnnotator, BoxLabel};
pub use font::LabelFont;
pub use bridge::{image_to_chw_tensor, image_to_mask, image_to_rgb, mask_to_image, rgb_to_image};
pub use palette::{label_color, overlay_davis, DEFAULT_ALPHA};

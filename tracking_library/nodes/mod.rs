//! Tracking Library Nodes
//!
//! Perception nodes and the helpers that let them run standalone. Every node
//! takes its topic names from [`NodeArgs`](tracking_core::NodeArgs), so
//! `~private` names land under the node namespace and can be remapped.
//!
//! # Perception
//! - `CutieNode` - video object segmentation seeded from one labelled mask
//! - `GroundingDinoNode` - open-vocabulary detection with runtime reconfiguration
//!
//! # Standalone runs
//! - `ImagePlayer` - replays a directory of frames (and an initial mask)
//! - `ResultRecorderNode` - writes output images to disk
//!
//! # Usage
//!
//! ```rust,ignore
//! use tracking_library::nodes::CutieNode;
//! use tracking_core::{NodeArgs, ParamStore, Scheduler};
//!
//! let args = NodeArgs::from_env("cutie_node")?;
//! let params = ParamStore::init(&args)?;
//!
//! let mut scheduler = Scheduler::new().with_name("cutie_node");
//! scheduler.add(Box::new(CutieNode::from_params(&args, &params)?), 0, Some(true));
//! scheduler.run()?;
//! ```

pub mod cutie_node;
pub mod grounding_dino_node;
pub mod image_player;
pub mod result_recorder;

pub use cutie_node::{CutieNode, CutieTopics, TrackerState};
pub use grounding_dino_node::{DetectionFrame, GroundingDinoNode, GroundingDinoTopics};
pub use image_player::{ImagePlayer, PlaybackConfig};
pub use result_recorder::ResultRecorderNode;

//! # tracking_core
//!
//! Runtime building blocks shared by the tracking_ros perception nodes:
//!
//! - **Nodes**: units of work driven by a [`Scheduler`]
//! - **Communication**: typed topics through [`Hub`], in-process or over shared memory
//! - **Parameters**: a namespaced [`ParamStore`] loaded from YAML and the command line
//! - **Names**: `~private`, relative and absolute topic names with remapping
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracking_core::{Hub, Node, NodeInfo};
//!
//! struct ExampleNode {
//!     output: Hub<String>,
//! }
//!
//! impl Node for ExampleNode {
//!     fn name(&self) -> &str { "example" }
//!
//!     fn tick(&mut self, mut ctx: Option<&mut NodeInfo>) {
//!         self.output.send("hello".to_string(), &mut ctx);
//!     }
//! }
//! ```

pub mod communication;
pub mod core;
pub mod error;
pub mod memory;
pub mod names;
pub mod params;
pub mod scheduling;

pub use crate::core::{LogSummary, Node, NodeConfig, NodeInfo, NodeInfoExt, NodeState, TopicMetadata};
pub use communication::{set_transport, wait_for_message, Hub, Message, Transport};
pub use error::{TrackingError, TrackingResult};
pub use names::{resolve_name, NodeArgs};
pub use params::ParamStore;
pub use scheduling::{Scheduler, StopHandle};

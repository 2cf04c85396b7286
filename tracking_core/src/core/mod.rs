//! # Core types and traits for node processes
//!
//! ## Node Lifecycle
//!
//! 1. **Construction** - node is created from its parameters
//! 2. **Initialization** - `init()` runs once; failures are fatal
//! 3. **Execution** - `tick()` is called repeatedly by the scheduler
//! 4. **Shutdown** - `shutdown()` is called to clean up resources

pub mod node;
pub mod node_info_ext;

pub use node::{LogSummary, Node, NodeConfig, NodeInfo, NodeMetrics, NodeState, TopicMetadata};
pub use node_info_ext::NodeInfoExt;

//! # Publish/subscribe
//!
//! - **Hub**: named, typed topic endpoint with bounded per-subscriber queues
//! - **wait_for_message**: one-shot blocking receive used during node startup
//! - **Transport**: in-process queues, optionally mirrored through shared memory
//!
//! ```rust,no_run
//! use tracking_core::communication::Hub;
//! let hub: Hub<String> = Hub::new("/chatter").unwrap();
//! ```

pub mod hub;
mod topic;

pub use hub::{wait_for_message, AtomicHubMetrics, Hub, HubMetrics, DEFAULT_QUEUE_SIZE};
pub use topic::{set_transport, topic_names, transport, Delivery, Message, Transport};

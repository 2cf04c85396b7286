//! # Scheduling
//!
//! Drives registered nodes through init, repeated ticks and shutdown:
//!
//! ```rust,ignore
//! use tracking_core::Scheduler;
//!
//! let mut scheduler = Scheduler::new().with_name("tracking");
//! scheduler.add(Box::new(player), 0, Some(false));
//! scheduler.add(Box::new(detector), 10, Some(true));
//! scheduler.run()?; // returns on Ctrl+C, stop() or a startup error
//! ```
//!
//! Lower priority values tick first within one cycle.

pub mod scheduler;

pub use scheduler::{Scheduler, StopHandle, DEFAULT_RATE_HZ};

//! Standard header carried by every stamped message

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock time stamp (seconds and nanoseconds since the Unix epoch)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    pub secs: i64,
    pub nsecs: u32,
}

impl Time {
    pub fn new(secs: i64, nsecs: u32) -> Self {
        Self { secs, nsecs }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            secs: now.timestamp(),
            nsecs: now.timestamp_subsec_nanos(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.nsecs == 0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.nsecs as f64 * 1e-9
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nsecs)
    }
}

/// Sequence number, stamp and coordinate frame of a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub seq: u32,
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    pub fn new(frame_id: &str) -> Self {
        Self {
            seq: 0,
            stamp: Time::now(),
            frame_id: frame_id.to_string(),
        }
    }

    /// Header for a result derived from `origin`: same frame, stamped now
    pub fn derived_from(origin: &Header) -> Self {
        Self {
            seq: origin.seq,
            stamp: Time::now(),
            frame_id: origin.frame_id.clone(),
        }
    }
}

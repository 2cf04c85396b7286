//! Shared memory backing for topics that cross process boundaries

mod platform;
pub mod shm_region;
pub mod shm_topic;

pub use platform::{
    process_alive, shm_base_dir, shm_topic_path, shm_topics_dir, SHM_DIR_ENV_VAR,
};
pub use shm_region::ShmRegion;
pub use shm_topic::{
    type_fingerprint, ShmCursor, ShmSample, ShmTopic, DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE,
};

// Shared memory locations and process liveness per platform
//
// Linux: /dev/shm/tracking_ros (tmpfs, RAM-backed)
// Elsewhere, or without /dev/shm: <temp dir>/tracking_ros

use std::path::PathBuf;

/// Environment variable overriding the shared memory base directory
pub const SHM_DIR_ENV_VAR: &str = "TRACKING_ROS_SHM_DIR";

/// Base directory for tracking_ros shared memory
pub fn shm_base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(SHM_DIR_ENV_VAR) {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "linux")]
    {
        let dev_shm = std::path::Path::new("/dev/shm");
        if dev_shm.is_dir() {
            return dev_shm.join("tracking_ros");
        }
    }

    std::env::temp_dir().join("tracking_ros")
}

/// Directory holding one file per shared topic
pub fn shm_topics_dir() -> PathBuf {
    shm_base_dir().join("topics")
}

/// Backing file of a topic; `/` and `:` become `_`
pub fn shm_topic_path(topic_name: &str) -> PathBuf {
    let safe_name = topic_name.trim_start_matches('/').replace(['/', ':'], "_");
    shm_topics_dir().join(format!("topic_{}", safe_name))
}

/// Whether a process with this id is still running
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    // Signal 0 only checks for existence and permission
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(pid: u32) -> bool {
    pid != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_path_is_flat() {
        let path = shm_topic_path("/cutie_node/output/segmentation");
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "topic_cutie_node_output_segmentation"
        );
        assert!(path.starts_with(shm_topics_dir()));
    }

    #[test]
    fn test_own_process_is_alive() {
        assert!(process_alive(std::process::id()));
        assert!(!process_alive(0));
        assert!(!process_alive(0x3FFF_FFF0));
    }
}

//! Shared memory transport between processes
//!
//! Every test in this binary uses the shared memory transport under a private
//! directory. The cross-process test re-runs this binary as the publisher.

use once_cell::sync::Lazy;
use std::process::Command;
use std::time::Duration;
use tracking_core::memory::{
    type_fingerprint, ShmTopic, DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE, SHM_DIR_ENV_VAR,
};
use tracking_core::{set_transport, Hub, Transport};

const CHILD_TOPIC_VAR: &str = "TRACKING_SHM_TEST_TOPIC";

static SHM_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(SHM_DIR_ENV_VAR, dir.path());
    dir
});

fn use_shared_memory() {
    Lazy::force(&SHM_DIR);
    set_transport(Transport::SharedMemory);
}

/// Publisher side of `test_message_crosses_process_boundary`
#[test]
#[ignore = "run as a child process"]
fn child_publisher() {
    let Ok(topic) = std::env::var(CHILD_TOPIC_VAR) else {
        return;
    };
    set_transport(Transport::SharedMemory);

    let publisher = Hub::<String>::publisher(&topic).unwrap();
    let start = std::time::Instant::now();
    while publisher.subscriber_count() == 0 {
        assert!(start.elapsed() < Duration::from_secs(10), "no subscriber appeared");
        std::thread::sleep(Duration::from_millis(1));
    }
    let delivery = publisher.send("from another process".to_string(), &mut None);
    assert!(delivery.shared);
}

#[test]
fn test_message_crosses_process_boundary() {
    use_shared_memory();
    let topic = format!("/shm_test/cross_process_{}", std::process::id());
    let subscriber = Hub::<String>::new(&topic).unwrap();

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["child_publisher", "--exact", "--ignored", "--test-threads=1"])
        .env(SHM_DIR_ENV_VAR, SHM_DIR.path())
        .env(CHILD_TOPIC_VAR, &topic)
        .status()
        .unwrap();
    assert!(status.success());

    let msg = subscriber.recv_blocking(Some(Duration::from_secs(5)));
    assert_eq!(msg.as_deref(), Some("from another process"));
}

#[test]
fn test_same_process_delivery_is_not_duplicated() {
    use_shared_memory();
    let publisher = Hub::<u32>::publisher("/shm_test/no_duplicates").unwrap();
    let subscriber = Hub::<u32>::new_with_capacity("/shm_test/no_duplicates", 8).unwrap();

    let delivery = publisher.send(11, &mut None);
    assert!(delivery.shared);
    assert_eq!(delivery.delivered, 1);

    assert_eq!(subscriber.recv_blocking(Some(Duration::from_secs(1))), Some(11));
    // Give the ring reader time to (wrongly) replay our own write
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(subscriber.recv(&mut None), None);
    assert_eq!(publisher.get_metrics().send_failures, 0);
}

#[test]
fn test_subscribers_are_counted_in_the_ring() {
    use_shared_memory();
    let name = "/shm_test/counted";
    let publisher = Hub::<String>::publisher(name).unwrap();
    let _a = Hub::<String>::new(name).unwrap();
    let b = Hub::<String>::new(name).unwrap();
    assert_eq!(publisher.subscriber_count(), 2);

    // A separate mapping sees the same registry
    let ring = ShmTopic::open_or_create(
        name,
        type_fingerprint::<String>(),
        DEFAULT_CAPACITY,
        DEFAULT_SLOT_SIZE,
    )
    .unwrap();
    assert_eq!(ring.subscriber_count(), 2);

    drop(b);
    assert_eq!(ring.subscriber_count(), 1);
}

#[test]
fn test_oversized_message_counts_as_send_failure() {
    use_shared_memory();
    let publisher = Hub::<String>::publisher("/shm_test/oversized").unwrap();
    let subscriber = Hub::<String>::new("/shm_test/oversized").unwrap();

    let delivery = publisher.send("x".repeat(DEFAULT_SLOT_SIZE), &mut None);
    assert!(!delivery.shared);
    assert_eq!(delivery.delivered, 1);
    assert_eq!(publisher.get_metrics().send_failures, 1);
    assert_eq!(subscriber.pending(), 1);
}

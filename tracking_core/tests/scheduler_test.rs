/// Integration tests for the scheduler lifecycle and tick ordering
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracking_core::core::{Node, NodeInfo};
use tracking_core::error::{TrackingError, TrackingResult};
use tracking_core::{Hub, Scheduler};

struct CountingNode {
    name: String,
    ticks: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl Node for CountingNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, _ctx: Option<&mut NodeInfo>) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&mut self, _ctx: &mut NodeInfo) -> TrackingResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_run_for_ticks_and_shuts_down() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let shutdowns = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new().with_name("test").with_rate(200.0);
    scheduler.add(
        Box::new(CountingNode {
            name: "counter".to_string(),
            ticks: ticks.clone(),
            shutdowns: shutdowns.clone(),
        }),
        0,
        None,
    );

    let result = scheduler.run_for(Duration::from_millis(100));
    assert!(result.is_ok());
    assert!(ticks.load(Ordering::SeqCst) > 0);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_running());
}

struct FailingInitNode;

impl Node for FailingInitNode {
    fn name(&self) -> &str {
        "failing_init"
    }

    fn init(&mut self, _ctx: &mut NodeInfo) -> TrackingResult<()> {
        Err(TrackingError::Config("Missing required parameter '/failing_init/model_path'".into()))
    }

    fn tick(&mut self, _ctx: Option<&mut NodeInfo>) {
        panic!("must not tick after a failed init");
    }
}

#[test]
fn test_init_failure_is_returned() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let shutdowns = Arc::new(AtomicUsize::new(0));

    let mut scheduler = Scheduler::new();
    scheduler.add(
        Box::new(CountingNode {
            name: "healthy".to_string(),
            ticks: ticks.clone(),
            shutdowns: shutdowns.clone(),
        }),
        0,
        None,
    );
    scheduler.add(Box::new(FailingInitNode), 10, None);

    let err = scheduler.run_for(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, TrackingError::Config(_)));
    assert!(err.is_fatal());
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    // Nodes initialized before the failure are still shut down
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

struct PanickingNode {
    ticks: Arc<AtomicUsize>,
}

impl Node for PanickingNode {
    fn name(&self) -> &str {
        "panicky"
    }

    fn tick(&mut self, _ctx: Option<&mut NodeInfo>) {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            panic!("first frame is corrupt");
        }
    }
}

#[test]
fn test_tick_panic_does_not_stop_scheduler() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let mut scheduler = Scheduler::new().with_rate(200.0);
    scheduler.add(
        Box::new(PanickingNode {
            ticks: ticks.clone(),
        }),
        0,
        None,
    );

    assert!(scheduler.run_for(Duration::from_millis(100)).is_ok());
    assert!(ticks.load(Ordering::SeqCst) > 1);
}

#[test]
fn test_priority_order() {
    let mut scheduler = Scheduler::new();
    for (name, priority) in [("late", 20), ("early", 0), ("middle", 10), ("middle2", 10)] {
        scheduler.add(
            Box::new(CountingNode {
                name: name.to_string(),
                ticks: Arc::new(AtomicUsize::new(0)),
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }),
            priority,
            None,
        );
    }
    assert_eq!(
        scheduler.get_node_list(),
        vec!["early", "middle", "middle2", "late"]
    );
}

struct Relay {
    input: Hub<u32>,
    output: Hub<u32>,
}

impl Node for Relay {
    fn name(&self) -> &str {
        "relay"
    }

    fn tick(&mut self, mut ctx: Option<&mut NodeInfo>) {
        if let Some(value) = self.input.recv(&mut ctx) {
            self.output.send(value * 2, &mut ctx);
        }
    }
}

#[test]
fn test_stop_handle_and_relay() {
    let source = Hub::<u32>::publisher("/test/scheduler/in").unwrap();
    let sink = Hub::<u32>::new("/test/scheduler/out").unwrap();

    let mut scheduler = Scheduler::new().with_rate(500.0);
    scheduler.add(
        Box::new(Relay {
            input: Hub::new("/test/scheduler/in").unwrap(),
            output: Hub::publisher("/test/scheduler/out").unwrap(),
        }),
        0,
        Some(true),
    );
    let stop = scheduler.stop_handle();

    let driver = std::thread::spawn(move || {
        while source.subscriber_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        source.send(21, &mut None);
        let value = sink.recv_blocking(Some(Duration::from_secs(5)));
        stop.stop();
        value
    });

    assert!(scheduler.run_for(Duration::from_secs(10)).is_ok());
    assert_eq!(driver.join().unwrap(), Some(42));
}

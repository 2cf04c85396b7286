use crate::core::{Node, NodeInfo, NodeState};
use crate::error::{TrackingError, TrackingResult};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, Weak};
use std::time::{Duration, Instant};

/// Default loop rate when none is configured
pub const DEFAULT_RATE_HZ: f64 = 100.0;

// Running flags of every scheduler currently inside run(); cleared on Ctrl+C.
static SIGNAL_TARGETS: Lazy<Mutex<Vec<Weak<AtomicBool>>>> = Lazy::new(|| Mutex::new(Vec::new()));
static SIGNAL_HANDLER: Once = Once::new();

fn install_signal_handler() {
    SIGNAL_HANDLER.call_once(|| {
        let result = ctrlc::set_handler(|| {
            tracing::warn!("Ctrl+C received, shutting down");
            for target in SIGNAL_TARGETS.lock().iter() {
                if let Some(running) = target.upgrade() {
                    running.store(false, Ordering::SeqCst);
                }
            }
            std::thread::spawn(|| {
                std::thread::sleep(Duration::from_secs(2));
                tracing::error!("Forcing exit after shutdown grace period");
                std::process::exit(0);
            });
        });
        if let Err(e) = result {
            tracing::warn!("Failed to set signal handler: {}", e);
        }
    });
}

/// Cloneable handle that stops a running scheduler from another thread
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct RegisteredNode {
    node: Box<dyn Node>,
    priority: u32,
    initialized: bool,
    context: NodeInfo,
}

/// Central orchestrator: holds nodes, drives the tick loop
pub struct Scheduler {
    nodes: Vec<RegisteredNode>,
    running: Arc<AtomicBool>,
    scheduler_name: String,
    rate_hz: f64,
    slow_tick_warning_ms: Option<u64>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            scheduler_name: "DefaultScheduler".to_string(),
            rate_hz: DEFAULT_RATE_HZ,
            slow_tick_warning_ms: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.scheduler_name = name.to_string();
        self
    }

    /// Set the loop rate in Hz; non-positive values keep the current rate
    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        if rate_hz > 0.0 && rate_hz.is_finite() {
            self.rate_hz = rate_hz;
        } else {
            tracing::warn!(rate_hz, "ignoring invalid scheduler rate");
        }
        self
    }

    /// Warn about ticks of nodes added afterwards that exceed `limit_ms`
    pub fn with_slow_tick_warning(mut self, limit_ms: u64) -> Self {
        self.slow_tick_warning_ms = Some(limit_ms);
        self
    }

    pub fn slow_tick_warning_ms(&self) -> Option<u64> {
        self.slow_tick_warning_ms
    }

    pub fn get_name(&self) -> &str {
        &self.scheduler_name
    }

    /// Register a node; lower `priority` ticks earlier in each cycle
    pub fn add(
        &mut self,
        node: Box<dyn Node>,
        priority: u32,
        logging_enabled: Option<bool>,
    ) -> &mut Self {
        let node_name = node.name().to_string();
        let logging_enabled = logging_enabled.unwrap_or(false);
        let mut context = NodeInfo::new(node_name.clone(), logging_enabled);
        if let Some(limit_ms) = self.slow_tick_warning_ms {
            context = context.with_slow_tick_warning(limit_ms);
        }

        // Stable sort keeps insertion order among equal priorities
        let position = self
            .nodes
            .iter()
            .position(|registered| registered.priority > priority)
            .unwrap_or(self.nodes.len());
        self.nodes.insert(
            position,
            RegisteredNode {
                node,
                priority,
                initialized: false,
                context,
            },
        );

        tracing::info!(
            scheduler = %self.scheduler_name,
            "Added node '{}' with priority {} (logging: {})",
            node_name,
            priority,
            logging_enabled
        );
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
        }
    }

    /// Names of registered nodes in tick order
    pub fn get_node_list(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|registered| registered.node.name().to_string())
            .collect()
    }

    /// State of a registered node, if present
    pub fn get_node_state(&self, name: &str) -> Option<NodeState> {
        self.nodes
            .iter()
            .find(|registered| registered.node.name() == name)
            .map(|registered| registered.context.state().clone())
    }

    /// Main loop with signal handling and cleanup
    pub fn run(&mut self) -> TrackingResult<()> {
        self.run_inner(None)
    }

    /// Run for at most `duration`, then shut down
    pub fn run_for(&mut self, duration: Duration) -> TrackingResult<()> {
        self.run_inner(Some(duration))
    }

    fn run_inner(&mut self, duration: Option<Duration>) -> TrackingResult<()> {
        let start_time = Instant::now();
        self.running.store(true, Ordering::SeqCst);

        install_signal_handler();
        {
            let mut targets = SIGNAL_TARGETS.lock();
            targets.retain(|target| target.strong_count() > 0);
            targets.push(Arc::downgrade(&self.running));
        }

        if let Err(e) = self.init_nodes() {
            self.shutdown_nodes();
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let period = Duration::from_secs_f64(1.0 / self.rate_hz);
        while self.is_running() {
            if let Some(max_duration) = duration {
                if start_time.elapsed() >= max_duration {
                    tracing::info!(
                        scheduler = %self.scheduler_name,
                        "Scheduler reached time limit of {:?}",
                        max_duration
                    );
                    break;
                }
            }

            let cycle_start = Instant::now();
            for registered in self.nodes.iter_mut() {
                Self::tick_node(registered);
            }

            let elapsed = cycle_start.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }

        self.shutdown_nodes();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(scheduler = %self.scheduler_name, "Scheduler shutdown complete");
        Ok(())
    }

    fn init_nodes(&mut self) -> TrackingResult<()> {
        for registered in self.nodes.iter_mut().filter(|r| !r.initialized) {
            let node_name = registered.node.name().to_string();
            let ctx = &mut registered.context;
            ctx.set_state(NodeState::Initializing);

            match registered.node.init(ctx) {
                Ok(()) => {
                    registered.initialized = true;
                    ctx.set_state(NodeState::Running);
                    tracing::info!("Initialized node '{}'", node_name);
                }
                Err(e) => {
                    ctx.transition_to_error(format!("Initialization failed: {}", e));
                    return Err(match e {
                        TrackingError::Config(_)
                        | TrackingError::Model(_)
                        | TrackingError::Timeout(_) => e,
                        other => TrackingError::Internal(format!(
                            "Node '{}' failed to initialize: {}",
                            node_name, other
                        )),
                    });
                }
            }
        }
        Ok(())
    }

    fn tick_node(registered: &mut RegisteredNode) {
        if !registered.initialized {
            return;
        }
        let ctx = &mut registered.context;
        ctx.start_tick();

        let node = &mut registered.node;
        let tick_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            node.tick(Some(&mut *ctx));
        }));

        match tick_result {
            Ok(()) => match ctx.take_tick_error() {
                None => ctx.record_tick(),
                Some(error_msg) => {
                    ctx.record_tick_failure(error_msg.clone());
                    registered.node.on_error(&error_msg, ctx);
                }
            },
            Err(panic_err) => {
                let error_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    format!("Node panicked: {}", s)
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    format!("Node panicked: {}", s)
                } else {
                    "Node panicked with unknown error".to_string()
                };
                ctx.record_tick_failure(error_msg.clone());
                registered.node.on_error(&error_msg, ctx);
            }
        }
    }

    fn shutdown_nodes(&mut self) {
        for registered in self.nodes.iter_mut().filter(|r| r.initialized) {
            let node_name = registered.node.name().to_string();
            let ctx = &mut registered.context;
            ctx.set_state(NodeState::Stopping);

            let metrics = ctx.metrics();
            tracing::info!(
                node = %node_name,
                ticks = metrics.total_ticks,
                failed = metrics.failed_ticks,
                sent = metrics.messages_sent,
                received = metrics.messages_received,
                "Node statistics"
            );

            match registered.node.shutdown(ctx) {
                Ok(()) => tracing::info!("Shutdown node '{}' successfully", node_name),
                Err(e) => tracing::error!("Error shutting down node '{}': {}", node_name, e),
            }
            registered.initialized = false;
            ctx.set_state(NodeState::Stopped);
        }
    }
}

use crate::error::TrackingResult;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// Trait for providing lightweight logging summaries of message types
///
/// Large messages (images, masks) should only report metadata so pub/sub
/// logging never formats pixel buffers.
pub trait LogSummary {
    /// Return a compact string representation suitable for logging
    fn log_summary(&self) -> String;
}

/// Node states for monitoring and lifecycle management
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Uninitialized,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Error(String),
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Uninitialized => write!(f, "Uninitialized"),
            NodeState::Initializing => write!(f, "Initializing"),
            NodeState::Running => write!(f, "Running"),
            NodeState::Stopping => write!(f, "Stopping"),
            NodeState::Stopped => write!(f, "Stopped"),
            NodeState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Performance metrics for node execution
#[derive(Debug, Clone, Default)]
pub struct NodeMetrics {
    pub total_ticks: u64,
    pub successful_ticks: u64,
    pub failed_ticks: u64,
    pub avg_tick_duration_ms: f64,
    pub max_tick_duration_ms: f64,
    pub last_tick_duration_ms: f64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors_count: u64,
    pub warnings_count: u64,
}

/// Configuration parameters for node behavior
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Emit pub/sub activity lines at debug level
    pub enable_logging: bool,
    /// Ticks slower than this are reported as warnings
    pub slow_tick_warning_ms: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            enable_logging: true,
            slow_tick_warning_ms: None,
        }
    }
}

/// Runtime context handed to a node by the scheduler
pub struct NodeInfo {
    name: String,
    state: NodeState,

    config: NodeConfig,
    metrics: NodeMetrics,

    tick_start_time: Option<Instant>,
    tick_error: Option<String>,

    // topic -> message count
    published_topics: HashMap<String, u64>,
    subscribed_topics: HashMap<String, u64>,
}

impl NodeInfo {
    pub fn new(node_name: String, logging_enabled: bool) -> Self {
        let config = NodeConfig {
            enable_logging: logging_enabled,
            ..Default::default()
        };

        Self {
            name: node_name,
            state: NodeState::Uninitialized,
            config,
            metrics: NodeMetrics::default(),
            tick_start_time: None,
            tick_error: None,
            published_topics: HashMap::new(),
            subscribed_topics: HashMap::new(),
        }
    }

    /// Warn about ticks that take longer than `limit_ms`
    pub fn with_slow_tick_warning(mut self, limit_ms: u64) -> Self {
        self.config.slow_tick_warning_ms = Some(limit_ms);
        self
    }

    // State Management Methods
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn set_state(&mut self, new_state: NodeState) {
        if self.state != new_state {
            tracing::debug!(node = %self.name, from = %self.state, to = %new_state, "state change");
            self.state = new_state;
        }
    }

    pub fn transition_to_error(&mut self, error_msg: String) {
        self.log_error(&error_msg);
        self.set_state(NodeState::Error(error_msg));
    }

    // Tick Management
    pub fn start_tick(&mut self) {
        self.tick_start_time = Some(Instant::now());
    }

    pub fn record_tick(&mut self) {
        if let Some(start_time) = self.tick_start_time.take() {
            let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

            self.metrics.total_ticks += 1;
            self.metrics.successful_ticks += 1;
            self.metrics.last_tick_duration_ms = duration_ms;
            if duration_ms > self.metrics.max_tick_duration_ms {
                self.metrics.max_tick_duration_ms = duration_ms;
            }

            let total_duration =
                self.metrics.avg_tick_duration_ms * (self.metrics.successful_ticks - 1) as f64;
            self.metrics.avg_tick_duration_ms =
                (total_duration + duration_ms) / self.metrics.successful_ticks as f64;

            if let Some(limit) = self.config.slow_tick_warning_ms {
                if duration_ms > limit as f64 {
                    self.log_warning(&format!(
                        "Tick took {:.1}ms (limit {}ms)",
                        duration_ms, limit
                    ));
                }
            }
        }
    }

    /// Mark the running tick as failed without panicking
    ///
    /// The scheduler records the failure once `tick` returns.
    pub fn fail_tick(&mut self, error_msg: String) {
        self.tick_error = Some(error_msg);
    }

    pub fn take_tick_error(&mut self) -> Option<String> {
        self.tick_error.take()
    }

    pub fn record_tick_failure(&mut self, error_msg: String) {
        self.metrics.total_ticks += 1;
        self.metrics.failed_ticks += 1;
        if let Some(start_time) = self.tick_start_time.take() {
            self.metrics.last_tick_duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        }

        self.log_error(&error_msg);
    }

    // Logging Methods

    /// Count a publication; the summary is computed before the message is moved
    pub fn log_pub_summary(&mut self, topic: &str, summary: &str, ipc_ns: u64) {
        if self.config.enable_logging {
            tracing::debug!(
                node = %self.name,
                topic,
                ipc_ns,
                tick_us = self.current_tick_us(),
                "--PUB--> {}",
                summary
            );
        }

        *self.published_topics.entry(topic.to_string()).or_insert(0) += 1;
        self.metrics.messages_sent += 1;
    }

    pub fn log_sub_summary(&mut self, topic: &str, summary: &str, ipc_ns: u64) {
        if self.config.enable_logging {
            tracing::debug!(
                node = %self.name,
                topic,
                ipc_ns,
                tick_us = self.current_tick_us(),
                "<--SUB-- {}",
                summary
            );
        }

        *self.subscribed_topics.entry(topic.to_string()).or_insert(0) += 1;
        self.metrics.messages_received += 1;
    }

    fn current_tick_us(&self) -> u64 {
        self.tick_start_time
            .map(|start| start.elapsed().as_micros() as u64)
            .unwrap_or(0)
    }

    pub fn log_info(&self, message: &str) {
        tracing::info!(node = %self.name, "{}", message);
    }

    pub fn log_warning(&mut self, message: &str) {
        tracing::warn!(node = %self.name, "{}", message);
        self.metrics.warnings_count += 1;
    }

    pub fn log_error(&mut self, message: &str) {
        tracing::error!(node = %self.name, "{}", message);
        self.metrics.errors_count += 1;
    }

    pub fn log_debug(&self, message: &str) {
        tracing::debug!(node = %self.name, "{}", message);
    }

    // Getters
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }
    pub fn published_topics(&self) -> &HashMap<String, u64> {
        &self.published_topics
    }
    pub fn subscribed_topics(&self) -> &HashMap<String, u64> {
        &self.subscribed_topics
    }
}

/// Topic metadata for monitoring and introspection
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMetadata {
    pub topic_name: String,
    pub type_name: String,
}

impl TopicMetadata {
    pub fn of<T>(topic_name: &str) -> Self {
        Self {
            topic_name: topic_name.to_string(),
            type_name: std::any::type_name::<T>().to_string(),
        }
    }
}

/// A computational unit driven by the scheduler
pub trait Node: Send {
    /// Get the node's name (must be unique within a scheduler)
    fn name(&self) -> &str;

    /// Initialize the node (called once at startup)
    ///
    /// An error here is a startup error: the scheduler stops and returns it.
    fn init(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        ctx.log_info("Node initialized successfully");
        Ok(())
    }

    /// Main execution step (called repeatedly)
    fn tick(&mut self, ctx: Option<&mut NodeInfo>);

    /// Shutdown the node (called once at cleanup)
    fn shutdown(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        ctx.log_info("Node shutdown successfully");
        Ok(())
    }

    /// Get list of publishers (topic metadata)
    fn get_publishers(&self) -> Vec<TopicMetadata> {
        Vec::new()
    }

    /// Get list of subscribers (topic metadata)
    fn get_subscribers(&self) -> Vec<TopicMetadata> {
        Vec::new()
    }

    /// Handle a failed tick (optional override)
    fn on_error(&mut self, error: &str, ctx: &mut NodeInfo) {
        ctx.log_error(&format!("Node error: {}", error));
    }
}

// LogSummary implementations for primitive types
impl LogSummary for f32 {
    fn log_summary(&self) -> String {
        format!("{:.3}", self)
    }
}

impl LogSummary for f64 {
    fn log_summary(&self) -> String {
        format!("{:.3}", self)
    }
}

impl LogSummary for i32 {
    fn log_summary(&self) -> String {
        self.to_string()
    }
}

impl LogSummary for u32 {
    fn log_summary(&self) -> String {
        self.to_string()
    }
}

impl LogSummary for bool {
    fn log_summary(&self) -> String {
        self.to_string()
    }
}

impl LogSummary for String {
    fn log_summary(&self) -> String {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_metrics() {
        let mut info = NodeInfo::new("test_node".to_string(), false);

        info.start_tick();
        info.record_tick();
        info.start_tick();
        info.record_tick_failure("frame dropped".to_string());

        let metrics = info.metrics();
        assert_eq!(metrics.total_ticks, 2);
        assert_eq!(metrics.successful_ticks, 1);
        assert_eq!(metrics.failed_ticks, 1);
        assert_eq!(metrics.errors_count, 1);
    }

    #[test]
    fn test_pub_sub_counters() {
        let mut info = NodeInfo::new("test_node".to_string(), true);
        info.log_pub_summary("/out", &"hello".to_string().log_summary(), 10);
        info.log_pub_summary("/out", "again", 10);
        info.log_sub_summary("/in", &1.5f32.log_summary(), 10);

        assert_eq!(info.published_topics().get("/out"), Some(&2));
        assert_eq!(info.subscribed_topics().get("/in"), Some(&1));
        assert_eq!(info.metrics().messages_sent, 2);
        assert_eq!(info.metrics().messages_received, 1);
    }

    #[test]
    fn test_slow_tick_is_warned() {
        let mut info = NodeInfo::new("test_node".to_string(), false).with_slow_tick_warning(0);
        assert_eq!(info.config().slow_tick_warning_ms, Some(0));

        info.start_tick();
        std::thread::sleep(std::time::Duration::from_millis(2));
        info.record_tick();
        assert_eq!(info.metrics().warnings_count, 1);
    }

    #[test]
    fn test_fail_tick_is_taken_once() {
        let mut info = NodeInfo::new("test_node".to_string(), false);
        info.fail_tick("bad frame".to_string());
        assert_eq!(info.take_tick_error(), Some("bad frame".to_string()));
        assert_eq!(info.take_tick_error(), None);
    }

    #[test]
    fn test_error_transition() {
        let mut info = NodeInfo::new("test_node".to_string(), false);
        info.transition_to_error("model missing".to_string());
        assert_eq!(info.state(), &NodeState::Error("model missing".to_string()));
        assert_eq!(info.state().to_string(), "Error: model missing");
    }
}

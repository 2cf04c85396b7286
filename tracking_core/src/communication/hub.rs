use super::topic::{lookup, Delivery, Message, Topic};
use crate::core::node::{LogSummary, NodeInfo};
use crate::error::{TrackingError, TrackingResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default subscriber queue length: only the newest message is kept
pub const DEFAULT_QUEUE_SIZE: usize = 1;

/// Lock-free counters for Hub monitoring
#[derive(Debug, Default)]
pub struct AtomicHubMetrics {
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    /// Messages discarded from full subscriber queues by our sends
    pub messages_dropped: AtomicU64,
    /// Sends that could not be written to shared memory
    pub send_failures: AtomicU64,
}

impl AtomicHubMetrics {
    pub fn snapshot(&self) -> HubMetrics {
        HubMetrics {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`AtomicHubMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub send_failures: u64,
}

/// Pub/sub endpoint on a named topic
///
/// A Hub created with [`Hub::new`] owns a subscriber queue and can both send
/// and receive; its own sends are never delivered back to it. A Hub created
/// with [`Hub::publisher`] only sends.
///
/// Topics created while the shared memory transport is selected (see
/// [`set_transport`](super::set_transport)) also reach Hubs in other processes.
pub struct Hub<T> {
    topic: Arc<Topic<T>>,
    topic_name: String,
    subscription: Option<u64>,
    latch: bool,
    metrics: Arc<AtomicHubMetrics>,
}

impl<T> std::fmt::Debug for Hub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("topic_name", &self.topic_name)
            .field("subscription", &self.subscription)
            .field("latch", &self.latch)
            .finish_non_exhaustive()
    }
}

impl<T: Message> Hub<T> {
    /// Subscribe to a topic with a queue of one message
    pub fn new(topic_name: &str) -> TrackingResult<Self> {
        Self::new_with_capacity(topic_name, DEFAULT_QUEUE_SIZE)
    }

    /// Subscribe to a topic with a custom queue length
    pub fn new_with_capacity(topic_name: &str, capacity: usize) -> TrackingResult<Self> {
        if capacity == 0 {
            return Err(TrackingError::Communication(format!(
                "Queue for '{}' must hold at least one message",
                topic_name
            )));
        }
        let topic = lookup::<T>(topic_name)?;
        let subscription = Some(topic.subscribe(capacity)?);

        Ok(Hub {
            topic,
            topic_name: topic_name.to_string(),
            subscription,
            latch: false,
            metrics: Arc::new(AtomicHubMetrics::default()),
        })
    }

    /// Publish-only endpoint
    pub fn publisher(topic_name: &str) -> TrackingResult<Self> {
        Ok(Hub {
            topic: lookup::<T>(topic_name)?,
            topic_name: topic_name.to_string(),
            subscription: None,
            latch: false,
            metrics: Arc::new(AtomicHubMetrics::default()),
        })
    }

    /// Keep the last sent message and replay it to late subscribers
    pub fn latched(mut self) -> Self {
        self.latch = true;
        self
    }

    /// Fire-and-forget send to every other subscriber of the topic
    pub fn send(&self, msg: T, ctx: &mut Option<&mut NodeInfo>) -> Delivery
    where
        T: LogSummary,
    {
        let summary = ctx.as_ref().map(|_| msg.log_summary());
        let ipc_start = Instant::now();

        let delivery = self.topic.publish(msg, self.subscription, self.latch);

        self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .messages_dropped
            .fetch_add(delivery.dropped as u64, Ordering::Relaxed);
        if self.topic.is_shared() && !delivery.shared {
            self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
        }

        if let (Some(ctx), Some(summary)) = (ctx.as_deref_mut(), summary) {
            let ipc_ns = ipc_start.elapsed().as_nanos() as u64;
            ctx.log_pub_summary(&self.topic_name, &summary, ipc_ns);
        }
        delivery
    }

    /// Receive the oldest pending message without blocking
    pub fn recv(&self, ctx: &mut Option<&mut NodeInfo>) -> Option<T>
    where
        T: LogSummary,
    {
        let id = self.subscription?;
        let ipc_start = Instant::now();
        let msg = self.topic.pop(id)?;

        self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
        if let Some(ctx) = ctx.as_deref_mut() {
            let ipc_ns = ipc_start.elapsed().as_nanos() as u64;
            ctx.log_sub_summary(&self.topic_name, &msg.log_summary(), ipc_ns);
        }
        Some(msg)
    }

    /// Block until a message arrives (or the timeout expires)
    pub fn recv_blocking(&self, timeout: Option<Duration>) -> Option<T> {
        let id = self.subscription?;
        let msg = self.topic.wait_pop(id, timeout)?;
        self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
        Some(msg)
    }

    /// Messages waiting in this Hub's queue
    pub fn pending(&self) -> usize {
        self.subscription.map(|id| self.topic.pending(id)).unwrap_or(0)
    }

    /// Subscribers of the topic other than this Hub, across processes for shared topics
    pub fn subscriber_count(&self) -> usize {
        let total = self.topic.subscriber_count();
        if self.subscription.is_some() {
            total.saturating_sub(1)
        } else {
            total
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn get_metrics(&self) -> HubMetrics {
        self.metrics.snapshot()
    }

    pub fn get_topic_name(&self) -> &str {
        &self.topic_name
    }
}

impl<T> Drop for Hub<T> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.topic.unsubscribe(id);
        }
    }
}

/// One-shot blocking subscription
///
/// Subscribes, waits for the next message on `topic_name` and unsubscribes.
/// With `timeout == None` this blocks until a message arrives.
pub fn wait_for_message<T: Message>(
    topic_name: &str,
    timeout: Option<Duration>,
) -> TrackingResult<T> {
    let hub = Hub::<T>::new(topic_name)?;
    tracing::debug!(topic = topic_name, ?timeout, "waiting for one message");
    hub.recv_blocking(timeout)
        .ok_or_else(|| TrackingError::Timeout(format!("a message on '{}'", topic_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_message_wins() {
        let publisher = Hub::<String>::publisher("/test/hub/latest").unwrap();
        let subscriber = Hub::<String>::new("/test/hub/latest").unwrap();

        publisher.send("first".to_string(), &mut None);
        let delivery = publisher.send("second".to_string(), &mut None);

        assert_eq!(
            delivery,
            Delivery {
                delivered: 1,
                dropped: 1,
                shared: false
            }
        );
        assert_eq!(subscriber.recv(&mut None), Some("second".to_string()));
        assert_eq!(subscriber.recv(&mut None), None);
        assert_eq!(publisher.get_metrics().messages_dropped, 1);
    }

    #[test]
    fn test_fan_out_and_no_echo() {
        let a = Hub::<u32>::new("/test/hub/fanout").unwrap();
        let b = Hub::<u32>::new_with_capacity("/test/hub/fanout", 4).unwrap();

        a.send(7, &mut None);
        a.send(8, &mut None);

        assert_eq!(a.recv(&mut None), None);
        assert_eq!(b.recv(&mut None), Some(7));
        assert_eq!(b.recv(&mut None), Some(8));
        assert_eq!(a.subscriber_count(), 1);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let _hub = Hub::<u32>::new("/test/hub/typed").unwrap();
        let err = Hub::<String>::new("/test/hub/typed").unwrap_err();
        assert!(matches!(err, TrackingError::Communication(_)));
    }

    #[test]
    fn test_latched_replay() {
        let publisher = Hub::<u32>::publisher("/test/hub/latched").unwrap().latched();
        publisher.send(42, &mut None);

        let late = Hub::<u32>::new("/test/hub/latched").unwrap();
        assert_eq!(late.recv(&mut None), Some(42));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let publisher = Hub::<u32>::publisher("/test/hub/drop").unwrap();
        {
            let _sub = Hub::<u32>::new("/test/hub/drop").unwrap();
            assert_eq!(publisher.subscriber_count(), 1);
        }
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes_generic_hub() {
        fn drop_all<T>(hubs: Vec<Hub<T>>) {
            drop(hubs);
        }

        let publisher = Hub::<Vec<u8>>::publisher("/test/hub/generic_drop").unwrap();
        let subs = vec![
            Hub::<Vec<u8>>::new("/test/hub/generic_drop").unwrap(),
            Hub::<Vec<u8>>::new("/test/hub/generic_drop").unwrap(),
        ];
        assert_eq!(publisher.subscriber_count(), 2);
        drop_all(subs);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_in_process_send_is_not_a_failure() {
        let publisher = Hub::<u32>::publisher("/test/hub/local_only").unwrap();
        let delivery = publisher.send(1, &mut None);
        assert!(!delivery.shared);
        assert_eq!(publisher.get_metrics().send_failures, 0);
    }

    #[test]
    fn test_wait_for_message_timeout() {
        let err = wait_for_message::<u32>("/test/hub/silent", Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, TrackingError::Timeout(_)));
    }

    #[test]
    fn test_wait_for_message_from_other_thread() {
        let waiter = std::thread::spawn(|| {
            wait_for_message::<u32>("/test/hub/wait", Some(Duration::from_secs(5)))
        });

        let publisher = Hub::<u32>::publisher("/test/hub/wait").unwrap();
        while publisher.subscriber_count() == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        publisher.send(5, &mut None);

        assert_eq!(waiter.join().unwrap().unwrap(), 5);
    }
}

//! Process-wide topic table backing [`Hub`](super::Hub)
//!
//! Every topic keeps one bounded queue per subscriber. A full queue drops its
//! oldest message, so slow consumers always see the newest data.
//!
//! With the [`Transport::SharedMemory`] transport each topic is also mirrored
//! into a [`ShmTopic`] ring: sends are serialized into the ring and a reader
//! thread feeds messages written by other processes into the local queues.

use crate::error::{TrackingError, TrackingResult};
use crate::memory::{type_fingerprint, ShmCursor, ShmTopic, DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const READER_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Anything that can travel over a topic
pub trait Message: Clone + Send + Serialize + DeserializeOwned + 'static {}

impl<T: Clone + Send + Serialize + DeserializeOwned + 'static> Message for T {}

/// How newly created topics reach their subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Queues inside this process only
    InProcess,
    /// Queues inside this process plus a shared memory ring for other processes
    SharedMemory,
}

impl FromStr for Transport {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "inprocess" | "in_process" => Ok(Transport::InProcess),
            "shm" | "shared_memory" => Ok(Transport::SharedMemory),
            other => Err(TrackingError::Config(format!(
                "Unknown transport '{}', expected 'shm' or 'local'",
                other
            ))),
        }
    }
}

static TRANSPORT: AtomicU8 = AtomicU8::new(0);

/// Select the transport of topics created from now on
pub fn set_transport(transport: Transport) {
    let previous = TRANSPORT.swap(transport as u8, Ordering::SeqCst);
    if previous != transport as u8 && !TOPICS.lock().is_empty() {
        tracing::warn!(
            ?transport,
            "transport changed after topics were created; existing topics keep theirs"
        );
    }
}

pub fn transport() -> Transport {
    match TRANSPORT.load(Ordering::SeqCst) {
        0 => Transport::InProcess,
        _ => Transport::SharedMemory,
    }
}

struct TopicEntry {
    type_id: TypeId,
    type_name: &'static str,
    topic: Arc<dyn Any + Send + Sync>,
}

static TOPICS: Lazy<Mutex<HashMap<String, TopicEntry>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Look up (or create) the topic with this name and message type
pub(crate) fn lookup<T: Message>(name: &str) -> TrackingResult<Arc<Topic<T>>> {
    let mut topics = TOPICS.lock();

    if let Some(entry) = topics.get(name) {
        if entry.type_id != TypeId::of::<T>() {
            return Err(TrackingError::Communication(format!(
                "Topic '{}' carries {} but was requested as {}",
                name,
                entry.type_name,
                std::any::type_name::<T>()
            )));
        }
        return entry
            .topic
            .clone()
            .downcast::<Topic<T>>()
            .map_err(|_| TrackingError::Internal(format!("Topic '{}' has a corrupt entry", name)));
    }

    let shared = match transport() {
        Transport::InProcess => None,
        Transport::SharedMemory => Some(Arc::new(ShmTopic::open_or_create(
            name,
            type_fingerprint::<T>(),
            DEFAULT_CAPACITY,
            DEFAULT_SLOT_SIZE,
        )?)),
    };

    let topic = Arc::new(Topic::<T>::new(name, shared));
    topics.insert(
        name.to_string(),
        TopicEntry {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            topic: topic.clone(),
        },
    );
    Ok(topic)
}

/// Names of all topics created in this process
pub fn topic_names() -> Vec<String> {
    let mut names: Vec<String> = TOPICS.lock().keys().cloned().collect();
    names.sort();
    names
}

struct SubscriberQueue<T> {
    capacity: usize,
    items: VecDeque<T>,
}

struct TopicState<T> {
    next_id: u64,
    queues: BTreeMap<u64, SubscriberQueue<T>>,
    latched: Option<T>,
    reader_running: bool,
}

/// Outcome of one publication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Local subscriber queues the message was pushed to
    pub delivered: usize,
    pub dropped: usize,
    /// Written to the shared memory ring
    pub shared: bool,
}

pub(crate) struct Topic<T> {
    name: String,
    state: Mutex<TopicState<T>>,
    ready: Condvar,
    shared: Option<Arc<ShmTopic>>,
}

impl<T> Topic<T> {
    fn new(name: &str, shared: Option<Arc<ShmTopic>>) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(TopicState {
                next_id: 0,
                queues: BTreeMap::new(),
                latched: None,
                reader_running: false,
            }),
            ready: Condvar::new(),
            shared,
        }
    }

    pub(crate) fn is_shared(&self) -> bool {
        self.shared.is_some()
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        let removed = self.state.lock().queues.remove(&id).is_some();
        if let (true, Some(shared)) = (removed, &self.shared) {
            shared.unregister_subscriber();
        }
    }

    /// Subscribers in this process, or in every process for a shared topic
    pub(crate) fn subscriber_count(&self) -> usize {
        match &self.shared {
            Some(shared) => shared.subscriber_count(),
            None => self.state.lock().queues.len(),
        }
    }

    pub(crate) fn pop(&self, id: u64) -> Option<T> {
        self.state
            .lock()
            .queues
            .get_mut(&id)
            .and_then(|queue| queue.items.pop_front())
    }

    pub(crate) fn pending(&self, id: u64) -> usize {
        self.state
            .lock()
            .queues
            .get(&id)
            .map(|queue| queue.items.len())
            .unwrap_or(0)
    }

    /// Block until a message is queued for `id`, or the timeout expires
    pub(crate) fn wait_pop(&self, id: u64, timeout: Option<Duration>) -> Option<T> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        loop {
            if let Some(msg) = state.queues.get_mut(&id).and_then(|q| q.items.pop_front()) {
                return Some(msg);
            }
            if !state.queues.contains_key(&id) {
                return None;
            }

            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        return state.queues.get_mut(&id).and_then(|q| q.items.pop_front());
                    }
                }
                None => self.ready.wait(&mut state),
            }
        }
    }
}

impl<T: Clone> Topic<T> {
    /// Fan a message out to every local subscriber except `exclude`
    fn deliver(&self, msg: T, exclude: Option<u64>, latch: bool) -> Delivery {
        let mut delivery = Delivery::default();
        {
            let mut state = self.state.lock();
            if latch {
                state.latched = Some(msg.clone());
            }

            for (id, queue) in state.queues.iter_mut() {
                if Some(*id) == exclude {
                    continue;
                }
                while queue.items.len() >= queue.capacity {
                    queue.items.pop_front();
                    delivery.dropped += 1;
                }
                queue.items.push_back(msg.clone());
                delivery.delivered += 1;
            }
        }
        if delivery.dropped > 0 {
            tracing::trace!(topic = %self.name, dropped = delivery.dropped, "stale messages dropped");
        }
        if delivery.delivered > 0 {
            self.ready.notify_all();
        }
        delivery
    }
}

impl<T: Message> Topic<T> {
    /// Register a subscriber queue; a latched message is delivered immediately
    pub(crate) fn subscribe(self: &Arc<Self>, capacity: usize) -> TrackingResult<u64> {
        if let Some(shared) = &self.shared {
            shared.register_subscriber()?;
        }

        let mut state = self.state.lock();
        if let Some(shared) = &self.shared {
            if !state.reader_running {
                let topic = Arc::clone(self);
                let cursor = shared.reader_cursor();
                let spawned = std::thread::Builder::new()
                    .name(format!("shm-reader:{}", self.name))
                    .spawn(move || topic.pump_shared(cursor));
                if let Err(e) = spawned {
                    shared.unregister_subscriber();
                    return Err(e.into());
                }
                state.reader_running = true;
            }
        }

        let id = state.next_id;
        state.next_id += 1;

        let mut items = VecDeque::with_capacity(capacity);
        if let Some(latched) = state.latched.clone() {
            items.push_back(latched);
        }
        state.queues.insert(
            id,
            SubscriberQueue {
                capacity: capacity.max(1),
                items,
            },
        );
        Ok(id)
    }

    /// Deliver locally, then hand the message to other processes
    pub(crate) fn publish(&self, msg: T, exclude: Option<u64>, latch: bool) -> Delivery {
        let payload = self.shared.as_ref().map(|_| bincode::serialize(&msg));
        let mut delivery = self.deliver(msg, exclude, latch);

        if let (Some(shared), Some(payload)) = (&self.shared, payload) {
            match payload
                .map_err(TrackingError::from)
                .and_then(|bytes| shared.write(&bytes, latch))
            {
                Ok(_) => delivery.shared = true,
                Err(e) => tracing::warn!(topic = %self.name, "shared memory write failed: {}", e),
            }
        }
        delivery
    }

    /// Reader thread body; runs while this process has subscribers
    fn pump_shared(self: Arc<Self>, mut cursor: ShmCursor) {
        let Some(shared) = self.shared.clone() else {
            return;
        };
        let own_pid = std::process::id();
        tracing::debug!(topic = %self.name, "shared memory reader started");

        loop {
            {
                let mut state = self.state.lock();
                if state.queues.is_empty() {
                    state.reader_running = false;
                    break;
                }
            }

            let samples = shared.read_from(&mut cursor);
            if samples.is_empty() {
                std::thread::sleep(READER_POLL_INTERVAL);
                continue;
            }

            // Our own sends were already delivered locally
            for sample in samples.into_iter().filter(|s| s.origin != own_pid) {
                match bincode::deserialize::<T>(&sample.payload) {
                    Ok(msg) => {
                        self.deliver(msg, None, sample.latched);
                    }
                    Err(e) => tracing::warn!(
                        topic = %self.name,
                        sequence = sample.sequence,
                        "dropping undecodable message: {}",
                        e
                    ),
                }
            }
        }
        tracing::debug!(topic = %self.name, "shared memory reader stopped");
    }
}

use super::platform::{process_alive, shm_topic_path};
use super::shm_region::ShmRegion;
use crate::error::{TrackingError, TrackingResult};
use std::path::Path;
use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const MAGIC: u64 = u64::from_le_bytes(*b"TRKSHM01");

/// Slots per topic ring
pub const DEFAULT_CAPACITY: usize = 4;
/// Largest serialized message a slot holds (a 1080p rgb8 frame fits)
pub const DEFAULT_SLOT_SIZE: usize = 16 * 1024 * 1024;

const MAX_CAPACITY: usize = 1024;
const MAX_TOTAL_SIZE: usize = 512 * 1024 * 1024;
const MAX_PROCESSES: usize = 32;
const ATTACH_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[repr(C)]
struct ProcessEntry {
    pid: AtomicU32,
    subscriptions: AtomicU32,
}

/// Ring header, written by the creating process before `magic` is published
#[repr(C, align(64))]
struct RingHeader {
    magic: AtomicU64,
    type_hash: AtomicU64,
    capacity: AtomicU64,
    slot_size: AtomicU64,
    /// Number of claimed write slots
    sequence: AtomicU64,
    /// Sequence + 1 of the newest latched message, 0 when none
    latched: AtomicU64,
    processes: [ProcessEntry; MAX_PROCESSES],
}

/// Per-slot header; `stamp` is sequence + 1 once the write completed, 0 while writing
#[repr(C, align(64))]
struct SlotHeader {
    stamp: AtomicU64,
    len: AtomicU64,
    origin: AtomicU32,
    latched: AtomicU32,
}

const HEADER_SIZE: usize = std::mem::size_of::<RingHeader>();
const SLOT_HEADER_SIZE: usize = std::mem::size_of::<SlotHeader>();

/// Message copied out of a ring slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmSample {
    pub sequence: u64,
    /// Process that wrote the message
    pub origin: u32,
    pub latched: bool,
    pub payload: Vec<u8>,
}

/// Read position of one reader
///
/// Messages below `live_from` were written before the reader attached and
/// are only delivered when latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmCursor {
    pub next: u64,
    pub live_from: u64,
}

/// Stable fingerprint of a message type, checked when attaching to a ring
pub fn type_fingerprint<T: ?Sized>() -> u64 {
    // FNV-1a
    std::any::type_name::<T>()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

/// Multi-writer broadcast ring of serialized messages in shared memory
///
/// Writers claim a slot with an atomic counter and publish it through the
/// slot stamp; readers copy a slot and re-check the stamp to detect overwrites.
pub struct ShmTopic {
    region: ShmRegion,
    base: *mut u8,
    name: String,
    capacity: u64,
    slot_size: usize,
    stride: usize,
}

// All shared state is accessed through atomics or guarded by slot stamps
unsafe impl Send for ShmTopic {}
unsafe impl Sync for ShmTopic {}

impl std::fmt::Debug for ShmTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmTopic")
            .field("name", &self.name)
            .field("path", &self.region.path())
            .field("capacity", &self.capacity)
            .field("slot_size", &self.slot_size)
            .finish()
    }
}

fn stride_for(slot_size: usize) -> usize {
    (SLOT_HEADER_SIZE + slot_size).div_ceil(64) * 64
}

impl ShmTopic {
    /// Open the ring of a topic under the shared memory directory
    pub fn open_or_create(
        name: &str,
        type_hash: u64,
        capacity: usize,
        slot_size: usize,
    ) -> TrackingResult<Self> {
        Self::open_or_create_at(&shm_topic_path(name), name, type_hash, capacity, slot_size)
    }

    /// Open the ring stored at `path`, creating it when absent
    ///
    /// An existing ring keeps its own capacity and slot size.
    pub fn open_or_create_at(
        path: &Path,
        name: &str,
        type_hash: u64,
        capacity: usize,
        slot_size: usize,
    ) -> TrackingResult<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(TrackingError::Config(format!(
                "Shared topic capacity must be within 1..={}, got {}",
                MAX_CAPACITY, capacity
            )));
        }
        if slot_size == 0 {
            return Err(TrackingError::Config(
                "Shared topic slot size must be positive".to_string(),
            ));
        }
        let total = HEADER_SIZE + capacity * stride_for(slot_size);
        if total > MAX_TOTAL_SIZE {
            return Err(TrackingError::Config(format!(
                "Shared topic '{}' needs {} bytes, maximum is {}",
                name, total, MAX_TOTAL_SIZE
            )));
        }

        let deadline = Instant::now() + ATTACH_TIMEOUT;
        let mut region = loop {
            // The creator may not have sized the file yet
            match ShmRegion::create_or_open(path, total) {
                Ok(region) if region.is_owner() || region.size() >= HEADER_SIZE => break region,
                Ok(_) | Err(TrackingError::Communication(_)) if Instant::now() < deadline => {
                    std::thread::sleep(POLL_INTERVAL)
                }
                Ok(_) => {
                    return Err(TrackingError::Timeout(format!(
                        "shared topic file {}",
                        path.display()
                    )))
                }
                Err(e) => return Err(e),
            }
        };
        let base = region.as_mut_ptr();
        let header = unsafe { &*(base as *const RingHeader) };

        if region.is_owner() {
            header.type_hash.store(type_hash, Ordering::Relaxed);
            header.capacity.store(capacity as u64, Ordering::Relaxed);
            header.slot_size.store(slot_size as u64, Ordering::Relaxed);
            header.magic.store(MAGIC, Ordering::Release);
            tracing::debug!(
                "Created shared topic '{}' at {} ({} x {} bytes)",
                name,
                path.display(),
                capacity,
                slot_size
            );
        } else {
            while header.magic.load(Ordering::Acquire) != MAGIC {
                if Instant::now() >= deadline {
                    return Err(TrackingError::Timeout(format!(
                        "initialization of shared topic file {} (remove it if stale)",
                        path.display()
                    )));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        if header.type_hash.load(Ordering::Relaxed) != type_hash {
            return Err(TrackingError::Communication(format!(
                "Topic '{}' is shared with a different message type",
                name
            )));
        }

        let capacity = header.capacity.load(Ordering::Relaxed);
        let slot_size = header.slot_size.load(Ordering::Relaxed) as usize;
        let stride = stride_for(slot_size);
        if capacity == 0 || region.size() < HEADER_SIZE + capacity as usize * stride {
            return Err(TrackingError::Communication(format!(
                "Shared topic file {} is truncated",
                path.display()
            )));
        }

        Ok(Self {
            region,
            base,
            name: name.to_string(),
            capacity,
            slot_size,
            stride,
        })
    }

    fn header(&self) -> &RingHeader {
        unsafe { &*(self.base as *const RingHeader) }
    }

    fn slot(&self, sequence: u64) -> (&SlotHeader, *mut u8) {
        let index = (sequence % self.capacity) as usize;
        unsafe {
            let slot = self.base.add(HEADER_SIZE + index * self.stride);
            (&*(slot as *const SlotHeader), slot.add(SLOT_HEADER_SIZE))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.region.path()
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Number of messages ever written
    pub fn sequence(&self) -> u64 {
        self.header().sequence.load(Ordering::Acquire)
    }

    /// Copy a serialized message into the next slot and return its sequence
    pub fn write(&self, payload: &[u8], latched: bool) -> TrackingResult<u64> {
        if payload.len() > self.slot_size {
            return Err(TrackingError::Communication(format!(
                "Message of {} bytes exceeds the {} byte slots of topic '{}'",
                payload.len(),
                self.slot_size,
                self.name
            )));
        }

        let header = self.header();
        let sequence = header.sequence.fetch_add(1, Ordering::AcqRel);
        let (slot, data) = self.slot(sequence);

        slot.stamp.store(0, Ordering::Relaxed);
        fence(Ordering::Release);
        unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), data, payload.len()) };
        slot.len.store(payload.len() as u64, Ordering::Relaxed);
        slot.origin.store(std::process::id(), Ordering::Relaxed);
        slot.latched.store(latched as u32, Ordering::Relaxed);
        slot.stamp.store(sequence + 1, Ordering::Release);

        if latched {
            header.latched.fetch_max(sequence + 1, Ordering::AcqRel);
        }
        Ok(sequence)
    }

    /// Cursor for a new reader in this process
    ///
    /// Starts at the latched message when its slot is intact and its writer,
    /// another process, is still running.
    pub fn reader_cursor(&self) -> ShmCursor {
        let header = self.header();
        let head = header.sequence.load(Ordering::Acquire);
        let latched = header.latched.load(Ordering::Acquire);

        let mut next = head;
        if latched > 0 {
            let (slot, _) = self.slot(latched - 1);
            let origin = slot.origin.load(Ordering::Relaxed);
            if slot.stamp.load(Ordering::Acquire) == latched
                && origin != std::process::id()
                && process_alive(origin)
            {
                next = latched - 1;
            }
        }
        ShmCursor {
            next,
            live_from: head,
        }
    }

    /// Copy every completed message from the cursor on, advancing it
    ///
    /// A reader that fell more than a ring behind skips to the oldest slot.
    pub fn read_from(&self, cursor: &mut ShmCursor) -> Vec<ShmSample> {
        let head = self.sequence();
        if head > cursor.next + self.capacity {
            cursor.next = head - self.capacity;
        }

        let mut samples = Vec::new();
        while cursor.next < head {
            let sequence = cursor.next;
            let (slot, data) = self.slot(sequence);
            let stamp = slot.stamp.load(Ordering::Acquire);

            if stamp > sequence + 1 {
                // Overwritten by a newer lap
                cursor.next += 1;
                continue;
            }
            if stamp != sequence + 1 {
                // Writer still copying
                break;
            }

            let len = (slot.len.load(Ordering::Relaxed) as usize).min(self.slot_size);
            let origin = slot.origin.load(Ordering::Relaxed);
            let latched = slot.latched.load(Ordering::Relaxed) != 0;
            let mut payload = vec![0u8; len];
            unsafe { std::ptr::copy_nonoverlapping(data as *const u8, payload.as_mut_ptr(), len) };
            fence(Ordering::Acquire);

            cursor.next += 1;
            if slot.stamp.load(Ordering::Relaxed) != stamp {
                continue;
            }
            if sequence < cursor.live_from && !latched {
                continue;
            }
            samples.push(ShmSample {
                sequence,
                origin,
                latched,
                payload,
            });
        }
        samples
    }

    /// Count one more subscriber in this process
    pub fn register_subscriber(&self) -> TrackingResult<()> {
        let pid = std::process::id();
        let processes = &self.header().processes;

        if let Some(entry) = processes
            .iter()
            .find(|e| e.pid.load(Ordering::Acquire) == pid)
        {
            entry.subscriptions.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }

        for entry in processes {
            let current = entry.pid.load(Ordering::Acquire);
            if (current == 0 || !process_alive(current))
                && entry
                    .pid
                    .compare_exchange(current, pid, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                entry.subscriptions.store(1, Ordering::Release);
                return Ok(());
            }
        }

        Err(TrackingError::Communication(format!(
            "Topic '{}' already has subscribers in {} processes",
            self.name, MAX_PROCESSES
        )))
    }

    pub fn unregister_subscriber(&self) {
        let pid = std::process::id();
        for entry in &self.header().processes {
            if entry.pid.load(Ordering::Acquire) == pid
                && entry
                    .subscriptions
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                    .is_ok()
            {
                return;
            }
        }
    }

    /// Subscribers across all running processes
    pub fn subscriber_count(&self) -> usize {
        self.header()
            .processes
            .iter()
            .filter_map(|entry| {
                let pid = entry.pid.load(Ordering::Acquire);
                (pid != 0 && process_alive(pid))
                    .then(|| entry.subscriptions.load(Ordering::Acquire) as usize)
            })
            .sum()
    }
}

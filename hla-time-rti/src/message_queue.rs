//! Pooled message storage and the indices a [`TimeManagement`](crate::time_management::TimeManagement)
//! engine dispatches from: a time-ordered queue keyed by [`LogicalTimePair`], a receive-order
//! queue, and a secondary index by object instance for retraction.
//!
//! The original OpenRTI implementation links queued messages through intrusive list/map hooks
//! on a pooled element type. Rust has no raw intrusive pointers, and `hla_time_keys::TinyMap`
//! is an always-growing slab with no removal, so slots here are recycled through a small
//! freelist-backed `Vec<Option<_>>` instead — the same "pool first, fall back to a fresh slot"
//! discipline, built out of safe code.

use std::collections::{HashMap, HashSet, VecDeque};
use std::collections::BTreeMap;

use hla_time_core::{LogicalTimePair, LogicalTimeValue, ObjectInstanceHandle};
use hla_time_keys::Key;

hla_time_keys::key_type!(
    /// A slab slot for a queued message. Recycled through the pool on removal.
    pub MessageKey
);

struct Slot<M> {
    payload: M,
    object_instance: Option<ObjectInstanceHandle>,
}

#[derive(Default)]
struct Slab<M> {
    entries: Vec<Option<Slot<M>>>,
    pool: Vec<MessageKey>,
}

impl<M> Slab<M> {
    fn insert(&mut self, slot: Slot<M>) -> MessageKey {
        if let Some(key) = self.pool.pop() {
            self.entries[key.index()] = Some(slot);
            key
        } else {
            let key = MessageKey::from(self.entries.len());
            self.entries.push(Some(slot));
            key
        }
    }

    fn remove(&mut self, key: MessageKey) -> Slot<M> {
        let slot = self.entries[key.index()]
            .take()
            .expect("dangling message key");
        self.pool.push(key);
        slot
    }
}

/// Pooled storage for queued messages plus the time-ordered, receive-order, and
/// by-object-instance indices over it.
pub struct MessageQueue<T: LogicalTimeValue, M> {
    slab: Slab<M>,
    time_ordered: BTreeMap<LogicalTimePair<T>, VecDeque<MessageKey>>,
    receive_order: VecDeque<MessageKey>,
    by_object: HashMap<ObjectInstanceHandle, HashSet<MessageKey>>,
}

impl<T: LogicalTimeValue, M> Default for MessageQueue<T, M> {
    fn default() -> Self {
        Self {
            slab: Slab::default(),
            time_ordered: BTreeMap::new(),
            receive_order: VecDeque::new(),
            by_object: HashMap::new(),
        }
    }
}

impl<T: LogicalTimeValue, M> MessageQueue<T, M> {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, payload: M, object_instance: Option<ObjectInstanceHandle>) -> MessageKey {
        let key = self.slab.insert(Slot {
            payload,
            object_instance,
        });
        if let Some(handle) = object_instance {
            self.by_object.entry(handle).or_default().insert(key);
        }
        key
    }

    /// Queue `payload` for timestamp-ordered dispatch at `pair`.
    pub fn push_time_ordered(
        &mut self,
        pair: LogicalTimePair<T>,
        payload: M,
        object_instance: Option<ObjectInstanceHandle>,
    ) {
        let key = self.alloc(payload, object_instance);
        self.time_ordered.entry(pair).or_default().push_back(key);
    }

    /// Queue `payload` for receive-order dispatch, bypassing the time-ordered buckets entirely.
    pub fn push_receive_order(&mut self, payload: M, object_instance: Option<ObjectInstanceHandle>) {
        let key = self.alloc(payload, object_instance);
        self.receive_order.push_back(key);
    }

    pub fn has_receive_order(&self) -> bool {
        !self.receive_order.is_empty()
    }

    pub fn pop_front_receive_order(&mut self) -> Option<M> {
        let key = self.receive_order.pop_front()?;
        Some(self.recycle(key))
    }

    /// The logical time of the earliest non-empty time-ordered bucket, if any.
    pub fn front_time(&self) -> Option<LogicalTimePair<T>> {
        self.time_ordered.keys().next().copied()
    }

    /// The payload of the earliest time-ordered entry, without removing it.
    pub fn peek_front_time_payload(&self) -> Option<&M> {
        let (_, bucket) = self.time_ordered.iter().next()?;
        let key = *bucket.front()?;
        self.slab.entries[key.index()].as_ref().map(|slot| &slot.payload)
    }

    pub fn pop_front_time_bucket(&mut self) -> Option<(LogicalTimePair<T>, M)> {
        let pair = self.front_time()?;
        let bucket = self.time_ordered.get_mut(&pair)?;
        let key = bucket.pop_front()?;
        if bucket.is_empty() {
            self.time_ordered.remove(&pair);
        }
        Some((pair, self.recycle(key)))
    }

    fn recycle(&mut self, key: MessageKey) -> M {
        let slot = self.slab.remove(key);
        if let Some(handle) = slot.object_instance {
            if let Some(keys) = self.by_object.get_mut(&handle) {
                keys.remove(&key);
                if keys.is_empty() {
                    self.by_object.remove(&handle);
                }
            }
        }
        slot.payload
    }

    /// Remove (without dispatching) every queued message addressed to `handle`, from both the
    /// time-ordered and receive-order queues. Used when an object instance is removed.
    pub fn erase_for_object_instance(&mut self, handle: ObjectInstanceHandle) -> usize {
        let Some(victims) = self.by_object.remove(&handle) else {
            return 0;
        };
        let count = victims.len();

        for bucket in self.time_ordered.values_mut() {
            bucket.retain(|k| !victims.contains(k));
        }
        self.time_ordered.retain(|_, bucket| !bucket.is_empty());
        self.receive_order.retain(|k| !victims.contains(k));

        for key in victims {
            self.slab.remove(key);
        }
        count
    }
}

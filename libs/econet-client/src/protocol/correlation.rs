//! Request/response correlation
//!
//! Requests register a waiter keyed by the expected response type and an
//! optional sub-device index. Inbound responses complete the oldest
//! matching waiter; an exact index match wins over an unkeyed one.
//! Waiters whose receiver was dropped (cancelled or timed out) are
//! skipped and discarded.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::oneshot;

use econet_wire::{FrameData, FrameType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    frame_type: FrameType,
    index: Option<u8>,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    tx: oneshot::Sender<FrameData>,
}

#[derive(Debug, Default)]
struct State {
    waiters: HashMap<Key, VecDeque<Waiter>>,
    next_id: u64,
}

/// Pending request map
#[derive(Debug, Default)]
pub(crate) struct Correlations {
    state: Mutex<State>,
}

impl Correlations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the given response
    pub fn register(
        &self,
        frame_type: FrameType,
        index: Option<u8>,
    ) -> (u64, oneshot::Receiver<FrameData>) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state
            .waiters
            .entry(Key { frame_type, index })
            .or_default()
            .push_back(Waiter { id, tx });
        (id, rx)
    }

    /// Remove one waiter, after a timeout or cancellation
    pub fn remove(&self, frame_type: FrameType, index: Option<u8>, id: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(queue) = state.waiters.get_mut(&Key { frame_type, index }) {
            queue.retain(|waiter| waiter.id != id);
            if queue.is_empty() {
                state.waiters.remove(&Key { frame_type, index });
            }
        }
    }

    /// Complete the oldest waiter matching a response.
    ///
    /// Tries the exact (type, index) key first, then the unkeyed entry,
    /// then any waiter of the same type. Returns whether a live waiter
    /// received the payload.
    pub fn complete(&self, frame_type: FrameType, index: Option<u8>, data: &FrameData) -> bool {
        let mut state = self.state.lock().unwrap();

        let mut candidates: Vec<Key> = Vec::new();
        if index.is_some() {
            candidates.push(Key { frame_type, index });
        }
        candidates.push(Key {
            frame_type,
            index: None,
        });
        let extra: Vec<Key> = state
            .waiters
            .keys()
            .filter(|key| key.frame_type == frame_type && !candidates.contains(key))
            .copied()
            .collect();
        candidates.extend(extra);

        for key in candidates {
            while let Some(waiter) = state
                .waiters
                .get_mut(&key)
                .and_then(|queue| queue.pop_front())
            {
                let delivered = waiter.tx.send(data.clone()).is_ok();
                if state.waiters.get(&key).is_some_and(|queue| queue.is_empty()) {
                    state.waiters.remove(&key);
                }
                if delivered {
                    return true;
                }
                // Receiver gone: cancelled request, try the next waiter
            }
        }
        false
    }

    /// Drop every waiter; their receivers resolve as closed
    pub fn fail_all(&self) {
        self.state.lock().unwrap().waiters.clear();
    }

    /// Number of live waiter entries
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .waiters
            .values()
            .map(VecDeque::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

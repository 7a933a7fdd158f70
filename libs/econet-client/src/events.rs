//! Event bus
//!
//! Each device owns one bus: a map of data cells plus per-key subscriber
//! lists. Every cell write runs the subscribers for that key, in
//! subscription order, through their filter chains. Waiters block on a
//! per-key notifier until the cell first exists. Dispatch never
//! suspends; callbacks are synchronous.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use econet_wire::Value;

use crate::error::{Error, Result};
use crate::filters::Filter;

/// Subscriber callback, run on the reader task
pub type Callback = Box<dyn FnMut(&Value) + Send>;

/// Identifies a subscription for [`EventBus::unsubscribe`]
pub type SubscriptionId = u64;

/// A callback with its filter chain
pub struct Subscriber {
    filters: Vec<Box<dyn Filter>>,
    callback: Callback,
}

impl Subscriber {
    pub fn new(callback: impl FnMut(&Value) + Send + 'static) -> Self {
        Self {
            filters: Vec::new(),
            callback: Box::new(callback),
        }
    }

    /// Append a filter; chains run left to right in insertion order
    pub fn with(mut self, filter: Box<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    fn deliver(&mut self, value: &Value) {
        let mut current = value.clone();
        for filter in &mut self.filters {
            match filter.apply(&current) {
                Some(next) => current = next,
                None => return,
            }
        }
        (self.callback)(&current);
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[derive(Debug)]
struct Entry {
    id: SubscriptionId,
    subscriber: Subscriber,
    once: bool,
}

#[derive(Debug, Default)]
struct BusState {
    data: HashMap<String, Value>,
    notifiers: HashMap<String, Arc<Notify>>,
    subscribers: HashMap<String, Vec<Entry>>,
    next_id: SubscriptionId,
}

impl BusState {
    fn notifier(&mut self, name: &str) -> Arc<Notify> {
        self.notifiers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }
}

/// Per-device data cells and subscriber registry
#[derive(Debug, Default)]
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a cell and deliver to its subscribers.
    ///
    /// Subscribers run outside the bus lock so a callback may touch the
    /// bus again (subscribe, read cells) without deadlocking.
    pub fn dispatch(&self, name: &str, value: Value) {
        let mut ready = {
            let mut state = self.state.lock().unwrap();
            state.data.insert(name.to_string(), value.clone());
            state.subscribers.remove(name).unwrap_or_default()
        };

        for entry in &mut ready {
            entry.subscriber.deliver(&value);
        }
        ready.retain(|entry| !entry.once);

        let notify = {
            let mut state = self.state.lock().unwrap();
            // Callbacks may have subscribed meanwhile; keep their order
            // after the pre-existing subscribers.
            let added = state.subscribers.remove(name).unwrap_or_default();
            ready.extend(added);
            if !ready.is_empty() {
                state.subscribers.insert(name.to_string(), ready);
            }
            state.notifiers.get(name).cloned()
        };

        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }

    /// Current value of a cell, if it exists
    pub fn get_nowait(&self, name: &str) -> Option<Value> {
        self.state.lock().unwrap().data.get(name).cloned()
    }

    /// All cell names currently present
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().data.keys().cloned().collect()
    }

    /// Snapshot of every cell
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.state.lock().unwrap().data.clone()
    }

    /// Wait until a cell exists, up to `timeout`
    pub async fn wait_for(&self, name: &str, timeout: Option<Duration>) -> Result<()> {
        let wait = async {
            loop {
                let notify = {
                    let mut state = self.state.lock().unwrap();
                    if state.data.contains_key(name) {
                        return;
                    }
                    state.notifier(name)
                };
                // The notified future registers for wakeups on creation;
                // re-checking afterwards closes the insert race.
                let notified = notify.notified();
                {
                    let state = self.state.lock().unwrap();
                    if state.data.contains_key(name) {
                        return;
                    }
                }
                notified.await;
            }
        };

        match timeout {
            None => {
                wait.await;
                Ok(())
            },
            Some(duration) => tokio::time::timeout(duration, wait)
                .await
                .map_err(|_| Error::timeout(format!("waiting for '{name}'"))),
        }
    }

    /// Wait for a cell and return its value
    pub async fn get(&self, name: &str, timeout: Option<Duration>) -> Result<Value> {
        self.wait_for(name, timeout).await?;
        self.get_nowait(name)
            .ok_or_else(|| Error::not_available(name.to_string()))
    }

    pub fn subscribe(&self, name: &str, subscriber: Subscriber) -> SubscriptionId {
        self.subscribe_entry(name, subscriber, false)
    }

    /// Subscribe for a single delivery
    pub fn subscribe_once(&self, name: &str, subscriber: Subscriber) -> SubscriptionId {
        self.subscribe_entry(name, subscriber, true)
    }

    fn subscribe_entry(&self, name: &str, subscriber: Subscriber, once: bool) -> SubscriptionId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state
            .subscribers
            .entry(name.to_string())
            .or_default()
            .push(Entry {
                id,
                subscriber,
                once,
            });
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, name: &str, id: SubscriptionId) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.subscribers.get_mut(name) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|entry| entry.id != id);
                before != entries.len()
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{debounce, on_change};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collector() -> (Arc<Mutex<Vec<Value>>>, Subscriber) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscriber = Subscriber::new(move |value: &Value| {
            sink.lock().unwrap().push(value.clone());
        });
        (seen, subscriber)
    }

    #[test]
    fn test_dispatch_updates_cell() {
        let bus = EventBus::new();
        assert!(bus.get_nowait("heating_temp").is_none());
        bus.dispatch("heating_temp", Value::Float(64.5));
        assert_eq!(bus.get_nowait("heating_temp"), Some(Value::Float(64.5)));
        bus.dispatch("heating_temp", Value::Float(65.0));
        assert_eq!(bus.get_nowait("heating_temp"), Some(Value::Float(65.0)));
    }

    #[test]
    fn test_subscribers_run_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let sink = order.clone();
            bus.subscribe(
                "state",
                Subscriber::new(move |_: &Value| sink.lock().unwrap().push(tag)),
            );
        }

        bus.dispatch("state", Value::Int(3));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_subscribe_once_removes_itself() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = calls.clone();
        bus.subscribe_once(
            "fan",
            Subscriber::new(move |_: &Value| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.dispatch("fan", Value::Bool(true));
        bus.dispatch("fan", Value::Bool(false));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (seen, subscriber) = collector();
        let id = bus.subscribe("x", subscriber);

        bus.dispatch("x", Value::Int(1));
        assert!(bus.unsubscribe("x", id));
        bus.dispatch("x", Value::Int(2));
        assert_eq!(*seen.lock().unwrap(), vec![Value::Int(1)]);
        assert!(!bus.unsubscribe("x", id));
    }

    #[test]
    fn test_filter_chain_on_subscription() {
        let bus = EventBus::new();
        let (seen, subscriber) = collector();
        bus.subscribe("temp", subscriber.with(on_change()).with(debounce(2)));

        for value in [1, 1, 2, 2, 2] {
            bus.dispatch("temp", Value::Int(value));
        }
        // on_change yields 1, 2; debounce(2) never sees two consecutive
        // equal values after de-duplication
        assert!(seen.lock().unwrap().is_empty());

        let bus = EventBus::new();
        let (seen, subscriber) = collector();
        bus.subscribe("temp", subscriber.with(debounce(2)));
        for value in [1, 1, 2, 2, 2] {
            bus.dispatch("temp", Value::Int(value));
        }
        assert_eq!(*seen.lock().unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_deliveries_follow_dispatch_order() {
        let bus = EventBus::new();
        let (seen, subscriber) = collector();
        bus.subscribe("key", subscriber);

        for value in 0..100 {
            bus.dispatch("key", Value::Int(value));
        }
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        for (index, value) in seen.iter().enumerate() {
            assert_eq!(value, &Value::Int(index as i64));
        }
    }

    #[test]
    fn test_callback_may_resubscribe() {
        let bus = Arc::new(EventBus::new());
        let bus_inner = bus.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = calls.clone();

        bus.subscribe_once(
            "boot",
            Subscriber::new(move |_: &Value| {
                let sink = sink.clone();
                bus_inner.subscribe(
                    "boot",
                    Subscriber::new(move |_: &Value| {
                        sink.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        bus.dispatch("boot", Value::Int(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        bus.dispatch("boot", Value::Int(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_existing_value() {
        let bus = EventBus::new();
        bus.dispatch("ready", Value::Bool(true));
        bus.wait_for("ready", Some(Duration::from_millis(10)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_future_value() {
        let bus = Arc::new(EventBus::new());
        let waiter = bus.clone();
        let handle = tokio::spawn(async move {
            waiter.get("late", Some(Duration::from_secs(1))).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.dispatch("late", Value::Int(7));

        assert_eq!(handle.await.unwrap().unwrap(), Value::Int(7));
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let bus = EventBus::new();
        let result = bus.wait_for("never", Some(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_debounce_filter_chain_composed() {
        // Chained filters hold independent state per subscription
        let bus = EventBus::new();
        let (seen_a, sub_a) = collector();
        let (seen_b, sub_b) = collector();
        bus.subscribe("v", sub_a.with(on_change()));
        bus.subscribe("v", sub_b.with(on_change()));

        bus.dispatch("v", Value::Int(1));
        bus.dispatch("v", Value::Int(1));
        assert_eq!(seen_a.lock().unwrap().len(), 1);
        assert_eq!(seen_b.lock().unwrap().len(), 1);
    }
}

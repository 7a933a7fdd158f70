//! Subscription filters
//!
//! Filters wrap a subscriber callback and decide, per inbound value,
//! whether (and with what value) the callback runs. A filter is a small
//! state machine `(value) -> Option<value>`; chains compose left to
//! right. Stateful filters keep their state on the subscription that
//! owns them.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::warn;

use econet_wire::Value;

/// One stage of a subscription's filter chain
pub trait Filter: Send {
    /// Feed a value through; `None` suppresses delivery
    fn apply(&mut self, value: &Value) -> Option<Value>;
}

// ============================================================================
// on_change
// ============================================================================

struct OnChange {
    last: Option<Value>,
}

impl Filter for OnChange {
    fn apply(&mut self, value: &Value) -> Option<Value> {
        // Floats compare bit-identically; NaN to NaN is "no change"
        if self.last.as_ref().is_some_and(|last| last.same_as(value)) {
            return None;
        }
        self.last = Some(value.clone());
        Some(value.clone())
    }
}

/// Forward only when the value differs from the previous delivery
pub fn on_change() -> Box<dyn Filter> {
    Box::new(OnChange { last: None })
}

// ============================================================================
// throttle
// ============================================================================

struct Throttle {
    window: Duration,
    last_forward: Option<Instant>,
}

impl Filter for Throttle {
    fn apply(&mut self, value: &Value) -> Option<Value> {
        let now = Instant::now();
        match self.last_forward {
            Some(last) if now.duration_since(last) < self.window => None,
            _ => {
                self.last_forward = Some(now);
                Some(value.clone())
            },
        }
    }
}

/// Forward the first value of each window, suppress the rest
pub fn throttle(window: Duration) -> Box<dyn Filter> {
    Box::new(Throttle {
        window,
        last_forward: None,
    })
}

// ============================================================================
// debounce
// ============================================================================

struct Debounce {
    min_calls: u32,
    calls: u32,
    previous: Option<Value>,
}

impl Filter for Debounce {
    fn apply(&mut self, value: &Value) -> Option<Value> {
        match &self.previous {
            Some(previous) if previous.same_as(value) => self.calls += 1,
            _ => self.calls = 1,
        }
        self.previous = Some(value.clone());

        if self.calls >= self.min_calls {
            self.calls = 0;
            self.previous = None;
            Some(value.clone())
        } else {
            None
        }
    }
}

/// Forward only after the same value arrived `min_calls` times in a row
pub fn debounce(min_calls: u32) -> Box<dyn Filter> {
    Box::new(Debounce {
        min_calls: min_calls.max(1),
        calls: 0,
        previous: None,
    })
}

// ============================================================================
// delta
// ============================================================================

struct Delta {
    last: Option<Value>,
}

fn numeric_delta(old: &Value, new: &Value) -> Option<Value> {
    match (old, new) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(b - a)),
        _ => Some(Value::Float(new.as_f64()? - old.as_f64()?)),
    }
}

fn value_delta(old: &Value, new: &Value) -> Option<Value> {
    match (old, new) {
        (Value::Map(old_map), Value::Map(new_map)) => {
            let deltas: BTreeMap<String, Value> = new_map
                .iter()
                .filter_map(|(key, new_value)| {
                    let old_value = old_map.get(key)?;
                    numeric_delta(old_value, new_value).map(|delta| (key.clone(), delta))
                })
                .collect();
            (!deltas.is_empty()).then_some(Value::Map(deltas))
        },
        (Value::List(old_list), Value::List(new_list)) => {
            if old_list.len() != new_list.len() {
                return None;
            }
            let deltas: Option<Vec<Value>> = old_list
                .iter()
                .zip(new_list)
                .map(|(a, b)| numeric_delta(a, b))
                .collect();
            deltas.map(Value::List)
        },
        (old, new) => numeric_delta(old, new),
    }
}

impl Filter for Delta {
    fn apply(&mut self, value: &Value) -> Option<Value> {
        let delta = self
            .last
            .as_ref()
            .and_then(|last| value_delta(last, value));
        self.last = Some(value.clone());
        delta
    }
}

/// Forward the difference between subsequent values
pub fn delta() -> Box<dyn Filter> {
    Box::new(Delta { last: None })
}

// ============================================================================
// aggregate
// ============================================================================

struct Aggregate {
    window: Duration,
    window_start: Instant,
    sum: f64,
}

impl Filter for Aggregate {
    fn apply(&mut self, value: &Value) -> Option<Value> {
        let Some(number) = value.as_f64() else {
            warn!("aggregate filter fed non-numeric value: {value:?}");
            return None;
        };
        self.sum += number;

        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            let total = self.sum;
            self.sum = 0.0;
            self.window_start = now;
            Some(Value::Float(total))
        } else {
            None
        }
    }
}

/// Forward the running sum at the end of each window; numeric values only
pub fn aggregate(window: Duration) -> Box<dyn Filter> {
    Box::new(Aggregate {
        window,
        window_start: Instant::now(),
        sum: 0.0,
    })
}

// ============================================================================
// clamp
// ============================================================================

struct Clamp {
    min: f64,
    max: f64,
}

impl Filter for Clamp {
    fn apply(&mut self, value: &Value) -> Option<Value> {
        let number = value.as_f64()?;
        if number < self.min {
            Some(Value::Float(self.min))
        } else if number > self.max {
            Some(Value::Float(self.max))
        } else {
            Some(value.clone())
        }
    }
}

/// Clamp numeric values between boundaries
pub fn clamp(min: f64, max: f64) -> Box<dyn Filter> {
    Box::new(Clamp { min, max })
}

// ============================================================================
// custom
// ============================================================================

struct Custom<F> {
    predicate: F,
}

impl<F: Fn(&Value) -> bool + Send> Filter for Custom<F> {
    fn apply(&mut self, value: &Value) -> Option<Value> {
        (self.predicate)(value).then(|| value.clone())
    }
}

/// Forward iff the predicate accepts the value
pub fn custom<F>(predicate: F) -> Box<dyn Filter>
where
    F: Fn(&Value) -> bool + Send + 'static,
{
    Box::new(Custom { predicate })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(filter: &mut Box<dyn Filter>, values: &[Value]) -> Vec<Value> {
        values.iter().filter_map(|v| filter.apply(v)).collect()
    }

    // ========== on_change ==========

    #[test]
    fn test_on_change_suppresses_repeats() {
        let mut filter = on_change();
        let out = feed(
            &mut filter,
            &[
                Value::Int(1),
                Value::Int(1),
                Value::Int(2),
                Value::Int(2),
                Value::Int(1),
            ],
        );
        assert_eq!(out, vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_on_change_idempotent_composition() {
        // on_change . on_change == on_change
        let mut single = on_change();
        let mut first = on_change();
        let mut second = on_change();

        let inputs = [
            Value::Int(1),
            Value::Int(1),
            Value::Int(3),
            Value::Int(3),
            Value::Int(3),
            Value::Int(1),
        ];
        let single_out = feed(&mut single, &inputs);
        let composed_out: Vec<Value> = inputs
            .iter()
            .filter_map(|v| first.apply(v))
            .filter_map(|v| second.apply(&v))
            .collect();
        assert_eq!(single_out, composed_out);
    }

    #[test]
    fn test_on_change_nan_is_stable() {
        let mut filter = on_change();
        assert!(filter.apply(&Value::Float(f64::NAN)).is_some());
        assert!(filter.apply(&Value::Float(f64::NAN)).is_none());
    }

    // ========== throttle ==========

    #[test]
    fn test_throttle_window() {
        let mut filter = throttle(Duration::from_millis(40));
        assert!(filter.apply(&Value::Int(1)).is_some());
        assert!(filter.apply(&Value::Int(2)).is_none());
        std::thread::sleep(Duration::from_millis(50));
        assert!(filter.apply(&Value::Int(3)).is_some());
    }

    #[test]
    fn test_throttle_forward_bound() {
        // At most ceil(duration / window) + 1 forwards
        let window = Duration::from_millis(20);
        let mut filter = throttle(window);
        let start = Instant::now();
        let mut forwards = 0;
        while start.elapsed() < Duration::from_millis(70) {
            if filter.apply(&Value::Int(0)).is_some() {
                forwards += 1;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(forwards <= 70 / 20 + 2, "forwarded {forwards} times");
        assert!(forwards >= 2);
    }

    // ========== debounce ==========

    #[test]
    fn test_debounce_requires_stability() {
        let mut filter = debounce(3);
        let out = feed(
            &mut filter,
            &[
                Value::Int(5),
                Value::Int(5),
                Value::Int(6), // resets the run
                Value::Int(6),
                Value::Int(6),
            ],
        );
        assert_eq!(out, vec![Value::Int(6)]);
    }

    #[test]
    fn test_debounce_single_call() {
        let mut filter = debounce(1);
        assert_eq!(filter.apply(&Value::Int(9)), Some(Value::Int(9)));
    }

    // ========== delta ==========

    #[test]
    fn test_delta_numbers() {
        let mut filter = delta();
        assert!(filter.apply(&Value::Int(10)).is_none());
        assert_eq!(filter.apply(&Value::Int(14)), Some(Value::Int(4)));
        assert_eq!(filter.apply(&Value::Int(11)), Some(Value::Int(-3)));
    }

    #[test]
    fn test_delta_floats() {
        let mut filter = delta();
        filter.apply(&Value::Float(1.5));
        assert_eq!(filter.apply(&Value::Float(4.0)), Some(Value::Float(2.5)));
    }

    #[test]
    fn test_delta_maps() {
        let mut filter = delta();
        let old = Value::Map(BTreeMap::from([
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Int(10)),
        ]));
        let new = Value::Map(BTreeMap::from([
            ("a".to_string(), Value::Int(4)),
            ("b".to_string(), Value::Int(7)),
        ]));
        filter.apply(&old);
        assert_eq!(
            filter.apply(&new),
            Some(Value::Map(BTreeMap::from([
                ("a".to_string(), Value::Int(3)),
                ("b".to_string(), Value::Int(-3)),
            ])))
        );
    }

    #[test]
    fn test_delta_lists() {
        let mut filter = delta();
        filter.apply(&Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(
            filter.apply(&Value::List(vec![Value::Int(5), Value::Int(1)])),
            Some(Value::List(vec![Value::Int(4), Value::Int(-1)]))
        );
        // Length mismatch suppresses
        assert!(filter
            .apply(&Value::List(vec![Value::Int(1)]))
            .is_none());
    }

    // ========== aggregate ==========

    #[test]
    fn test_aggregate_conserves_sum() {
        let mut filter = aggregate(Duration::from_millis(30));
        let mut forwarded = 0.0;
        let mut fed = 0.0;
        for _ in 0..8 {
            fed += 2.5;
            if let Some(Value::Float(sum)) = filter.apply(&Value::Float(2.5)) {
                forwarded += sum;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        // Flush whatever remains by waiting out the window
        std::thread::sleep(Duration::from_millis(40));
        if let Some(Value::Float(sum)) = filter.apply(&Value::Float(0.0)) {
            forwarded += sum;
        }
        assert_eq!(forwarded, fed);
    }

    #[test]
    fn test_aggregate_rejects_non_numeric() {
        let mut filter = aggregate(Duration::from_millis(1));
        assert!(filter.apply(&Value::from("text")).is_none());
    }

    // ========== clamp / custom ==========

    #[test]
    fn test_clamp() {
        let mut filter = clamp(0.0, 100.0);
        assert_eq!(filter.apply(&Value::Float(-5.0)), Some(Value::Float(0.0)));
        assert_eq!(filter.apply(&Value::Float(42.0)), Some(Value::Float(42.0)));
        assert_eq!(filter.apply(&Value::Float(142.0)), Some(Value::Float(100.0)));
    }

    #[test]
    fn test_custom_predicate() {
        let mut filter = custom(|value| value.as_i64().is_some_and(|v| v > 10));
        assert!(filter.apply(&Value::Int(5)).is_none());
        assert_eq!(filter.apply(&Value::Int(11)), Some(Value::Int(11)));
    }

    // ========== composition ==========

    #[test]
    fn test_chain_left_to_right() {
        // delta then custom(>0): only increases get through
        let mut stage1 = delta();
        let mut stage2 = custom(|value| value.as_f64().is_some_and(|v| v > 0.0));
        let inputs = [Value::Int(1), Value::Int(3), Value::Int(2), Value::Int(7)];
        let out: Vec<Value> = inputs
            .iter()
            .filter_map(|v| stage1.apply(v))
            .filter_map(|v| stage2.apply(&v))
            .collect();
        assert_eq!(out, vec![Value::Int(2), Value::Int(5)]);
    }
}

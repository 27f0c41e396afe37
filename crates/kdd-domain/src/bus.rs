//! Synchronous in-memory event bus.
//!
//! Consumers are invoked in registration order, in publish order, at most
//! once per event. A consumer that keeps exceeding the configured time
//! threshold is detached with a warning so it cannot stall the producer.

use crate::events::Event;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// An event together with its bus-assigned sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedEvent {
    pub sequence: u64,
    pub event: Event,
}

/// Callback interface for event consumers.
pub trait EventConsumer: Send {
    fn on_event(&mut self, event: &SequencedEvent);
}

impl<F> EventConsumer for F
where
    F: FnMut(&SequencedEvent) + Send,
{
    fn on_event(&mut self, event: &SequencedEvent) {
        self(event);
    }
}

struct Registration {
    name: String,
    consumer: Box<dyn EventConsumer>,
    slow_strikes: u32,
}

const SLOW_STRIKE_LIMIT: u32 = 3;

/// Publish/subscribe bus with ordered, at-most-once delivery.
pub struct EventBus {
    inner: Mutex<BusState>,
    slow_threshold: Duration,
}

struct BusState {
    sequence: u64,
    consumers: Vec<Registration>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_slow_threshold(Duration::from_millis(50))
    }

    #[must_use]
    pub fn with_slow_threshold(slow_threshold: Duration) -> Self {
        Self {
            inner: Mutex::new(BusState {
                sequence: 0,
                consumers: Vec::new(),
            }),
            slow_threshold,
        }
    }

    pub fn subscribe(&self, name: impl Into<String>, consumer: impl EventConsumer + 'static) {
        let mut state = self.inner.lock().expect("event bus poisoned");
        state.consumers.push(Registration {
            name: name.into(),
            consumer: Box::new(consumer),
            slow_strikes: 0,
        });
    }

    /// Dispatch an event to every registered consumer and return its
    /// sequence number.
    pub fn publish(&self, event: Event) -> u64 {
        let mut state = self.inner.lock().expect("event bus poisoned");
        state.sequence += 1;
        let sequenced = SequencedEvent {
            sequence: state.sequence,
            event,
        };

        let threshold = self.slow_threshold;
        let mut detached: Vec<String> = Vec::new();
        for reg in &mut state.consumers {
            let started = Instant::now();
            reg.consumer.on_event(&sequenced);
            if started.elapsed() > threshold {
                reg.slow_strikes += 1;
                if reg.slow_strikes >= SLOW_STRIKE_LIMIT {
                    detached.push(reg.name.clone());
                }
            } else {
                reg.slow_strikes = 0;
            }
        }

        if !detached.is_empty() {
            for name in &detached {
                log::warn!("detaching slow event consumer '{name}'");
            }
            state.consumers.retain(|r| !detached.contains(&r.name));
        }

        sequenced.sequence
    }

    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.inner.lock().expect("event bus poisoned").consumers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::mpsc;

    fn detected(path: &str) -> Event {
        Event::DocumentDetected {
            source_path: path.into(),
            source_hash: "h".into(),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn delivers_in_order_with_increasing_sequence() {
        let bus = EventBus::new();
        let (tx, rx) = mpsc::channel();
        bus.subscribe("probe", move |e: &SequencedEvent| {
            tx.send(e.sequence).unwrap();
        });

        bus.publish(detected("a.md"));
        bus.publish(detected("b.md"));
        bus.publish(detected("c.md"));

        let received: Vec<u64> = rx.try_iter().collect();
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[test]
    fn detaches_consistently_slow_consumer() {
        let bus = EventBus::with_slow_threshold(Duration::from_millis(1));
        bus.subscribe("sleepy", |_: &SequencedEvent| {
            std::thread::sleep(Duration::from_millis(5));
        });
        assert_eq!(bus.consumer_count(), 1);

        for _ in 0..SLOW_STRIKE_LIMIT {
            bus.publish(detected("x.md"));
        }
        assert_eq!(bus.consumer_count(), 0);
    }

    #[test]
    fn fast_consumer_stays_subscribed() {
        let bus = EventBus::new();
        bus.subscribe("fast", |_: &SequencedEvent| {});
        for _ in 0..10 {
            bus.publish(detected("x.md"));
        }
        assert_eq!(bus.consumer_count(), 1);
    }
}

//! Single-producer, multi-consumer event fan-out.
//!
//! Listeners registered before an emission receive it; there is no replay
//! buffer for late subscribers.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

type Listener<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct ListenerEntry<T> {
    id: u64,
    listener: Listener<T>,
}

struct FanoutState<T> {
    next_id: u64,
    listeners: Vec<ListenerEntry<T>>,
}

/// Typed listener list used for chat messages and channel events.
pub struct EventFanout<T> {
    state: Mutex<FanoutState<T>>,
}

impl<T> Default for EventFanout<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(FanoutState {
                next_id: 0,
                listeners: Vec::new(),
            }),
        }
    }
}

impl<T> std::fmt::Debug for EventFanout<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EventFanout")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T> EventFanout<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, FanoutState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a callback invoked synchronously for every later emission.
    pub fn add_listener<F>(&self, listener: F) -> u64
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.push_listener(Arc::new(move |event: &T| {
            listener(event);
            true
        }))
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        let mut state = self.lock_state();
        let before = state.listeners.len();
        state.listeners.retain(|entry| entry.id != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock_state().listeners.len()
    }

    fn push_listener(&self, listener: Listener<T>) -> u64 {
        let mut state = self.lock_state();
        let id = state.next_id;
        state.next_id = state.next_id.saturating_add(1);
        state.listeners.push(ListenerEntry { id, listener });
        id
    }

    /// Delivers `event` to every registered listener in registration order.
    ///
    /// Channel listeners whose receiver was dropped are pruned. A panicking
    /// listener is logged and skipped; later listeners still run.
    pub fn emit(&self, event: &T) {
        let snapshot = {
            let state = self.lock_state();
            state
                .listeners
                .iter()
                .map(|entry| (entry.id, Arc::clone(&entry.listener)))
                .collect::<Vec<_>>()
        };
        let mut closed = Vec::new();
        for (id, listener) in snapshot {
            match std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(true) => {}
                Ok(false) => closed.push(id),
                Err(panic) => {
                    tracing::warn!(
                        listener = id,
                        panic = panic_message(panic.as_ref()),
                        "event listener panicked"
                    );
                }
            }
        }
        if !closed.is_empty() {
            self.lock_state()
                .listeners
                .retain(|entry| !closed.contains(&entry.id));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<T> EventFanout<T>
where
    T: Clone + Send + 'static,
{
    /// Returns an unbounded receiver fed by every later emission.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_listener(Arc::new(move |event: &T| tx.send(event.clone()).is_ok()));
        rx
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::EventFanout;

    #[test]
    fn unit_listeners_receive_events_in_registration_order() {
        let fanout = EventFanout::<String>::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        for label in ["first", "second"] {
            let seen = Arc::clone(&seen);
            fanout.add_listener(move |event: &String| {
                seen.lock().expect("lock").push(format!("{label}:{event}"));
            });
        }
        fanout.emit(&"hello".to_string());
        assert_eq!(
            *seen.lock().expect("lock"),
            vec!["first:hello".to_string(), "second:hello".to_string()]
        );
    }

    #[test]
    fn unit_late_listener_does_not_see_earlier_events() {
        let fanout = EventFanout::<u32>::new();
        fanout.emit(&1);
        let mut rx = fanout.subscribe();
        fanout.emit(&2);
        assert_eq!(rx.try_recv().expect("event"), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn regression_dropped_subscriber_is_pruned_on_next_emit() {
        let fanout = EventFanout::<u32>::new();
        let rx = fanout.subscribe();
        let counter = Arc::new(AtomicUsize::new(0));
        let listener_counter = Arc::clone(&counter);
        fanout.add_listener(move |_| {
            listener_counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fanout.listener_count(), 2);
        drop(rx);
        fanout.emit(&7);
        assert_eq!(fanout.listener_count(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn regression_panicking_listener_does_not_stop_later_listeners_or_emits() {
        let fanout = EventFanout::<u32>::new();
        fanout.add_listener(|event: &u32| {
            if *event == 1 {
                panic!("listener bug");
            }
        });
        let mut rx = fanout.subscribe();

        fanout.emit(&1);
        fanout.emit(&2);

        assert_eq!(fanout.listener_count(), 2);
        assert_eq!(rx.try_recv().expect("first"), 1);
        assert_eq!(rx.try_recv().expect("second"), 2);
    }

    #[test]
    fn unit_remove_listener_stops_delivery() {
        let fanout = EventFanout::<u32>::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let listener_counter = Arc::clone(&counter);
        let id = fanout.add_listener(move |_| {
            listener_counter.fetch_add(1, Ordering::SeqCst);
        });
        fanout.emit(&1);
        assert!(fanout.remove_listener(id));
        fanout.emit(&2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!fanout.remove_listener(id));
    }
}

//! Event bridge: forwards asynchronous native engine events to registered
//! handler sinks.
//!
//! Delivery is immediate and synchronous in whatever thread the native
//! engine raises the event on; the bridge performs no buffering or batching,
//! so per-source emission order is preserved by construction. The sink table
//! is the only bridge state an engine thread may touch, and it sits behind
//! its own lock so a delivery racing a teardown can fail cleanly instead of
//! touching freed state.

use std::sync::Arc;

use parking_lot::RwLock;
use slotmap::{Key, KeyData, SlotMap};

use rtm_bridge_core::Value;

slotmap::new_key_type! {
    struct SinkKey;
}

/// Identifier for a registered event handler sink. Distinct from engine
/// handles; zero is "invalid/none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventHandlerHandle(u64);

impl EventHandlerHandle {
    pub const NONE: EventHandlerHandle = EventHandlerHandle(0);

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        EventHandlerHandle(raw)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    fn key(self) -> SinkKey {
        KeyData::from_ffi(self.0).into()
    }

    fn from_key(key: SinkKey) -> Self {
        EventHandlerHandle(key.data().as_ffi())
    }
}

/// An event as delivered to a handler: name plus payload, encoded with the
/// same bounded type system as call arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Event name, e.g. `"messageEvent"` or `"presenceEvent"`.
    pub name: String,
    pub payload: Value,
}

/// A callback sink. Invoked exactly once per native event, synchronously,
/// from the thread the engine raised the event on.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &EventEnvelope);
}

/// Owns the sink table and hands out forwarders to the native side.
#[derive(Clone, Default)]
pub struct EventRouter {
    sinks: Arc<RwLock<SlotMap<SinkKey, Box<dyn EventSink>>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback sink and return its handle.
    pub fn create_handler(&self, sink: Box<dyn EventSink>) -> EventHandlerHandle {
        let key = self.sinks.write().insert(sink);
        let handle = EventHandlerHandle::from_key(key);
        tracing::debug!("event handler {:#x} registered", handle.raw());
        handle
    }

    /// Unregister a sink. Returns false if the handle was unknown or
    /// already destroyed.
    pub fn destroy_handler(&self, handle: EventHandlerHandle) -> bool {
        let removed = self.sinks.write().remove(handle.key()).is_some();
        if removed {
            tracing::debug!("event handler {:#x} destroyed", handle.raw());
        }
        removed
    }

    /// Mint a forwarder the native engine can raise events through.
    pub fn forwarder(&self, handle: EventHandlerHandle) -> EventForwarder {
        EventForwarder {
            handle,
            router: self.clone(),
        }
    }

    fn deliver(&self, handle: EventHandlerHandle, event: &EventEnvelope) -> bool {
        let sinks = self.sinks.read();
        match sinks.get(handle.key()) {
            Some(sink) => {
                sink.on_event(event);
                true
            }
            None => {
                // The handler is gone; the event is dropped, never the memory.
                tracing::warn!(
                    "dropping event `{}` for destroyed handler {:#x}",
                    event.name,
                    handle.raw()
                );
                false
            }
        }
    }
}

/// Cloneable delivery endpoint bound to one handler handle.
#[derive(Clone)]
pub struct EventForwarder {
    handle: EventHandlerHandle,
    router: EventRouter,
}

impl EventForwarder {
    /// Deliver one event. Returns false when the handler has been
    /// destroyed, in which case the event is silently dropped.
    pub fn deliver(&self, name: impl Into<String>, payload: Value) -> bool {
        let event = EventEnvelope {
            name: name.into(),
            payload,
        };
        self.router.deliver(self.handle, &event)
    }
}

/// Sink adapter that forwards every delivered event into an unbounded
/// channel, for callers that drain events from their own thread.
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<EventEnvelope>,
}

impl ChannelSink {
    pub fn new() -> (Self, crossbeam_channel::Receiver<EventEnvelope>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: &EventEnvelope) {
        if self.tx.send(event.clone()).is_err() {
            tracing::warn!("event receiver dropped; `{}` discarded", event.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_preserves_emission_order() {
        let router = EventRouter::new();
        let (sink, rx) = ChannelSink::new();
        let handle = router.create_handler(Box::new(sink));
        let forwarder = router.forwarder(handle);

        for i in 0..10i64 {
            assert!(forwarder.deliver("messageEvent", Value::Int(i)));
        }
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 10);
        for (i, event) in received.iter().enumerate() {
            assert_eq!(event.payload, Value::Int(i as i64));
        }
    }

    #[test]
    fn test_delivery_after_destroy_is_swallowed() {
        let router = EventRouter::new();
        let (sink, rx) = ChannelSink::new();
        let handle = router.create_handler(Box::new(sink));
        let forwarder = router.forwarder(handle);

        assert!(router.destroy_handler(handle));
        assert!(!forwarder.deliver("messageEvent", Value::Int(1)));
        assert!(rx.try_recv().is_err());
        // Destroying again reports the handle as unknown.
        assert!(!router.destroy_handler(handle));
    }

    #[test]
    fn test_zero_handle_never_receives() {
        let router = EventRouter::new();
        let forwarder = router.forwarder(EventHandlerHandle::NONE);
        assert!(!forwarder.deliver("messageEvent", Value::Bool(true)));
    }

    #[test]
    fn test_destroyed_handler_value_is_not_reissued() {
        let router = EventRouter::new();
        let (sink_a, _rx_a) = ChannelSink::new();
        let first = router.create_handler(Box::new(sink_a));
        router.destroy_handler(first);
        let (sink_b, rx_b) = ChannelSink::new();
        let second = router.create_handler(Box::new(sink_b));
        assert_ne!(first.raw(), second.raw());

        // A forwarder minted for the old handle cannot reach the new sink.
        let stale = router.forwarder(first);
        assert!(!stale.deliver("messageEvent", Value::Int(0)));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_handlers_are_independent() {
        let router = EventRouter::new();
        let (sink_a, rx_a) = ChannelSink::new();
        let (sink_b, rx_b) = ChannelSink::new();
        let a = router.create_handler(Box::new(sink_a));
        let b = router.create_handler(Box::new(sink_b));

        router.forwarder(a).deliver("presenceEvent", Value::str("x"));
        assert_eq!(rx_a.try_iter().count(), 1);
        assert_eq!(rx_b.try_iter().count(), 0);
        router.destroy_handler(a);
        router.forwarder(b).deliver("presenceEvent", Value::str("y"));
        assert_eq!(rx_b.try_iter().count(), 1);
    }
}

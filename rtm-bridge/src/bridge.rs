//! The narrow call surface driven by the managed caller.
//!
//! Mirrors the conceptual C surface one to one: `create_engine`,
//! `destroy_engine`, `call`, `create_event_handler`,
//! `destroy_event_handler`, plus the pure `reason_for`/`version` lookups in
//! `rtm_bridge_core`. Every method takes `&mut self`, so the
//! no-concurrent-calls contract of the underlying engine is enforced by the
//! borrow checker instead of by convention.

use rtm_bridge_core::{ApiFunction, ApiParam, BridgeError, Value};

use crate::engine::{ClientHandle, EngineFactory};
use crate::event::{EventForwarder, EventHandlerHandle, EventRouter, EventSink};
use crate::registry::{Handle, Registry};
use crate::router;

pub struct Bridge {
    registry: Registry,
    events: EventRouter,
    factory: Box<dyn EngineFactory>,
}

impl Bridge {
    pub fn new(factory: impl EngineFactory + 'static) -> Self {
        Self::with_events(factory, EventRouter::new())
    }

    /// Build a bridge over an existing event router. Lets the caller
    /// register handler sinks before the factory is constructed, so the
    /// factory can be handed a handler handle up front.
    pub fn with_events(factory: impl EngineFactory + 'static, events: EventRouter) -> Self {
        Self {
            registry: Registry::new(),
            events,
            factory: Box::new(factory),
        }
    }

    /// Create an engine session from a client handle.
    ///
    /// Returns [`Handle::NONE`] on failure, in which case nothing was
    /// registered: creation either fully succeeds or fully fails.
    pub fn create_engine(&mut self, client: ClientHandle) -> Handle {
        match self.factory.create_engine(client, &self.events) {
            Some(native) => {
                let handle = self.registry.insert_engine(native);
                tracing::info!("engine {} created from client {:#x}", handle, client);
                handle
            }
            None => {
                tracing::warn!("engine creation failed for client {:#x}", client);
                Handle::NONE
            }
        }
    }

    /// Destroy an engine session. The handle becomes permanently invalid.
    pub fn destroy_engine(&mut self, handle: Handle) -> Result<(), BridgeError> {
        if !self.registry.is_engine(handle) {
            return Err(BridgeError::HandleNotFound);
        }
        self.registry.remove(handle);
        tracing::info!("engine {} destroyed", handle);
        Ok(())
    }

    /// Dispatch one call. The envelope carries the input arguments going in
    /// and the result slot coming out; the return value is the status code
    /// (`0` success, negative mapped error).
    pub fn call(&mut self, handle: Handle, param: &mut ApiParam) -> i32 {
        router::dispatch(&mut self.registry, handle, param)
    }

    /// Typed convenience over [`Bridge::call`] for in-process callers that
    /// hold an [`ApiFunction`] rather than a wire envelope.
    pub fn dispatch(
        &mut self,
        handle: Handle,
        fun: ApiFunction,
        args: &[Value],
    ) -> Result<Option<Value>, BridgeError> {
        router::dispatch_typed(&mut self.registry, handle, fun, args)
    }

    /// Register an event handler sink.
    pub fn create_event_handler(&mut self, sink: Box<dyn EventSink>) -> EventHandlerHandle {
        self.events.create_handler(sink)
    }

    /// Unregister an event handler. Deliveries racing past this point are
    /// dropped, never delivered to freed state.
    pub fn destroy_event_handler(&mut self, handle: EventHandlerHandle) -> Result<(), BridgeError> {
        if self.events.destroy_handler(handle) {
            Ok(())
        } else {
            Err(BridgeError::HandleNotFound)
        }
    }

    /// Mint a forwarder for the native side to raise events through.
    pub fn forwarder(&self, handle: EventHandlerHandle) -> EventForwarder {
        self.events.forwarder(handle)
    }

    /// The event router, for collaborators that wire their own forwarders.
    pub fn events(&self) -> &EventRouter {
        &self.events
    }

    /// Number of live registry objects (engines plus channels).
    pub fn live_objects(&self) -> usize {
        self.registry.len()
    }
}
